//! Quorum engine: the write and read paths of a coordinating node.
//!
//! Write path:
//! 1. Apply locally with a fresh version (counts as one ack)
//! 2. W=1: acknowledge now, optionally fanning out in the background
//! 3. Otherwise replicate to peers one at a time, in order, and acknowledge
//!    as soon as W nodes hold the version
//! 4. Peers exhausted below W: `QuorumNotMet`, the local write stays
//!
//! Read path:
//! - R=1: the local record, nothing else
//! - R>1: local plus all peers in parallel, stop at R responses, return the
//!   highest version seen (ties keep the earliest response)
//!
//! With W + R > N every read quorum overlaps every write quorum, so the
//! highest version among R responses is never older than the last
//! acknowledged write.

use crate::common::{Error, NodeMetrics, Result};
use crate::coordinator::replica_client::ReplicaClient;
use crate::store::{Record, VersionedStore};
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Quorum configuration, fixed at construction
#[derive(Debug, Clone)]
pub struct QuorumConfig {
    /// Write quorum (W), including this node
    pub write_quorum: usize,
    /// Read quorum (R), including this node
    pub read_quorum: usize,
    /// Ordered replica set, never containing this node
    pub peers: Vec<String>,
    /// Replicate to every peer in the background when W=1
    pub background_fanout: bool,
}

impl QuorumConfig {
    /// Total replica count N, including this node
    pub fn replica_count(&self) -> usize {
        self.peers.len() + 1
    }

    fn validate(&self) -> Result<()> {
        let n = self.replica_count();
        if self.write_quorum == 0 || self.write_quorum > n {
            return Err(Error::InvalidConfig(format!(
                "write quorum {} outside 1..={}",
                self.write_quorum, n
            )));
        }
        if self.read_quorum == 0 || self.read_quorum > n {
            return Err(Error::InvalidConfig(format!(
                "read quorum {} outside 1..={}",
                self.read_quorum, n
            )));
        }
        Ok(())
    }
}

/// Successful write acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteAck {
    pub version: u64,
    /// Nodes holding the version when the write was acknowledged
    pub acks: usize,
}

/// Coordinates writes and reads for one node.
///
/// Generic over `C: ReplicaClient` so tests can swap the HTTP transport
/// for in-process peers.
pub struct QuorumEngine<C: ReplicaClient> {
    node_id: String,
    store: Arc<VersionedStore>,
    client: Arc<C>,
    config: QuorumConfig,
    metrics: Arc<NodeMetrics>,
}

impl<C: ReplicaClient> std::fmt::Debug for QuorumEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuorumEngine")
            .field("node_id", &self.node_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: ReplicaClient> QuorumEngine<C> {
    pub fn new(
        node_id: impl Into<String>,
        store: Arc<VersionedStore>,
        client: Arc<C>,
        config: QuorumConfig,
        metrics: Arc<NodeMetrics>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            node_id: node_id.into(),
            store,
            client,
            config,
            metrics,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn store(&self) -> &Arc<VersionedStore> {
        &self.store
    }

    pub fn config(&self) -> &QuorumConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Write
    // -----------------------------------------------------------------------

    pub async fn write(&self, key: &str, value: &str) -> Result<WriteAck> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        let started = Instant::now();
        let result = self.replicate_write(key, value).await;
        self.metrics.write_latency.observe_duration(started.elapsed());

        match &result {
            Ok(_) => self.metrics.writes_acked.inc(),
            Err(Error::QuorumNotMet { .. }) => self.metrics.writes_quorum_failed.inc(),
            Err(_) => {}
        }
        result
    }

    async fn replicate_write(&self, key: &str, value: &str) -> Result<WriteAck> {
        let version = self.store.put(key, value, None)?;
        let needed = self.config.write_quorum;
        let mut acks = 1usize;

        if needed <= 1 {
            if self.config.background_fanout && !self.config.peers.is_empty() {
                self.spawn_fanout(key, value, version);
            }
            return Ok(WriteAck { version, acks });
        }

        for peer in &self.config.peers {
            match self.client.replicate(peer, key, value, version).await {
                Ok(()) => {
                    self.metrics.replications_ok.inc();
                    acks += 1;
                    tracing::debug!(node_id = %self.node_id, peer = %peer, key, version, acks, "Replicated");
                    if acks >= needed {
                        return Ok(WriteAck { version, acks });
                    }
                }
                Err(e) => {
                    self.metrics.replications_failed.inc();
                    tracing::warn!(node_id = %self.node_id, peer = %peer, key, version, error = %e, "Replication failed");
                }
            }
        }

        tracing::warn!(
            node_id = %self.node_id,
            key,
            version,
            acks,
            needed,
            "Write quorum not met; local write kept"
        );
        Err(Error::QuorumNotMet {
            needed,
            got: acks,
            version: Some(version),
        })
    }

    /// Fire-and-forget replication to every peer, used when W=1
    fn spawn_fanout(&self, key: &str, value: &str, version: u64) {
        let client = self.client.clone();
        let peers = self.config.peers.clone();
        let metrics = self.metrics.clone();
        let node_id = self.node_id.clone();
        let key = key.to_string();
        let value = value.to_string();

        tokio::spawn(async move {
            for peer in &peers {
                match client.replicate(peer, &key, &value, version).await {
                    Ok(()) => metrics.replications_ok.inc(),
                    Err(e) => {
                        metrics.replications_failed.inc();
                        tracing::warn!(node_id = %node_id, peer = %peer, key = %key, version, error = %e, "Background replication failed");
                    }
                }
            }
        });
    }

    // -----------------------------------------------------------------------
    // Read
    // -----------------------------------------------------------------------

    pub async fn read(&self, key: &str) -> Result<Record> {
        let started = Instant::now();
        let result = self.collect_read(key).await;
        self.metrics.read_latency.observe_duration(started.elapsed());

        match &result {
            Ok(_) => self.metrics.reads_served.inc(),
            Err(Error::NotFound(_)) => self.metrics.reads_not_found.inc(),
            Err(Error::QuorumNotMet { .. }) => self.metrics.reads_quorum_failed.inc(),
            Err(_) => {}
        }
        result
    }

    async fn collect_read(&self, key: &str) -> Result<Record> {
        let needed = self.config.read_quorum;
        let local = self.store.get(key)?;

        if needed <= 1 {
            return local.ok_or_else(|| Error::NotFound(key.to_string()));
        }

        // The local answer is always the first response collected.
        let mut responses = vec![local];

        let mut pending: FuturesUnordered<_> = self
            .config
            .peers
            .iter()
            .map(|peer| async move { (peer, self.client.read_remote(peer, key).await) })
            .collect();

        while responses.len() < needed {
            let Some((peer, result)) = pending.next().await else {
                break;
            };
            match result {
                Ok(found) => responses.push(found),
                Err(e) => {
                    self.metrics.remote_reads_failed.inc();
                    tracing::warn!(node_id = %self.node_id, peer = %peer, key, error = %e, "Remote read failed");
                }
            }
        }
        drop(pending);

        if responses.len() < needed {
            tracing::warn!(
                node_id = %self.node_id,
                key,
                responded = responses.len(),
                needed,
                "Read quorum not met"
            );
            return Err(Error::QuorumNotMet {
                needed,
                got: responses.len(),
                version: None,
            });
        }

        resolve_latest(responses.into_iter().flatten())
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }
}

/// Pick the record with the strictly greatest version.
///
/// Equal versions keep whichever came first in `records`.
pub fn resolve_latest(records: impl IntoIterator<Item = Record>) -> Option<Record> {
    records.into_iter().fold(None, |latest, candidate| match latest {
        Some(current) if current.version >= candidate.version => Some(current),
        _ => Some(candidate),
    })
}
