//! Topology variants behind the [`Coordinator`] trait
//!
//! - [`Leader`]: the single coordinator of a leader-follower deployment.
//!   Replicates to its followers, refuses replicated writes.
//! - [`Follower`]: refuses client writes, applies what the leader sends and
//!   answers reads from its own store.
//! - [`Leaderless`]: every node coordinates the requests it receives and
//!   accepts replicated writes from every other node.

use crate::common::{
    pause, Config, Error, FixedLatency, LatencyModel, NodeMetrics, NodeRole, Result,
};
use crate::coordinator::quorum::{QuorumConfig, QuorumEngine, WriteAck};
use crate::coordinator::replica_client::{HttpReplicaClient, ReplicaClient};
use crate::coordinator::Coordinator;
use crate::store::{Record, VersionedStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Peer-facing behavior every role shares
#[derive(Debug)]
struct LocalReplica {
    node_id: String,
    store: Arc<VersionedStore>,
    latency: Arc<dyn LatencyModel>,
    metrics: Arc<NodeMetrics>,
}

impl LocalReplica {
    async fn local_read(&self, key: &str) -> Result<Record> {
        pause(self.latency.read_delay()).await;
        self.store
            .get(key)?
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    async fn apply(&self, key: &str, value: &str, version: u64) -> Result<u64> {
        pause(self.latency.apply_delay()).await;
        let stored = self.store.put(key, value, Some(version))?;
        self.metrics.replicas_applied.inc();
        tracing::debug!(node_id = %self.node_id, key, version, "Applied replicated write");
        Ok(stored)
    }

    fn forbidden(&self, reason: &str) -> Error {
        self.metrics.forbidden.inc();
        tracing::warn!(node_id = %self.node_id, "{}", reason);
        Error::Forbidden(reason.to_string())
    }
}

// ---------------------------------------------------------------------------
// Leader-follower
// ---------------------------------------------------------------------------

pub struct Leader<C: ReplicaClient> {
    engine: QuorumEngine<C>,
    replica: LocalReplica,
}

impl<C: ReplicaClient> Leader<C> {
    pub fn new(
        engine: QuorumEngine<C>,
        latency: Arc<dyn LatencyModel>,
        metrics: Arc<NodeMetrics>,
    ) -> Self {
        let replica = LocalReplica {
            node_id: engine.node_id().to_string(),
            store: engine.store().clone(),
            latency,
            metrics,
        };
        Self { engine, replica }
    }
}

#[async_trait]
impl<C: ReplicaClient> Coordinator for Leader<C> {
    fn node_id(&self) -> &str {
        &self.replica.node_id
    }

    fn role(&self) -> NodeRole {
        NodeRole::Leader
    }

    fn store(&self) -> &Arc<VersionedStore> {
        &self.replica.store
    }

    fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.replica.metrics
    }

    async fn write(&self, key: &str, value: &str) -> Result<WriteAck> {
        self.engine.write(key, value).await
    }

    async fn read(&self, key: &str) -> Result<Record> {
        self.engine.read(key).await
    }

    async fn local_read(&self, key: &str) -> Result<Record> {
        self.replica.local_read(key).await
    }

    async fn apply_replica(&self, _key: &str, _value: &str, _version: u64) -> Result<u64> {
        Err(self
            .replica
            .forbidden("leader does not accept replicated writes"))
    }
}

pub struct Follower {
    replica: LocalReplica,
}

impl Follower {
    pub fn new(
        node_id: impl Into<String>,
        store: Arc<VersionedStore>,
        latency: Arc<dyn LatencyModel>,
        metrics: Arc<NodeMetrics>,
    ) -> Self {
        Self {
            replica: LocalReplica {
                node_id: node_id.into(),
                store,
                latency,
                metrics,
            },
        }
    }
}

#[async_trait]
impl Coordinator for Follower {
    fn node_id(&self) -> &str {
        &self.replica.node_id
    }

    fn role(&self) -> NodeRole {
        NodeRole::Follower
    }

    fn store(&self) -> &Arc<VersionedStore> {
        &self.replica.store
    }

    fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.replica.metrics
    }

    async fn write(&self, _key: &str, _value: &str) -> Result<WriteAck> {
        Err(self.replica.forbidden("writes must go to the leader"))
    }

    /// Followers answer reads from their own store only
    async fn read(&self, key: &str) -> Result<Record> {
        let metrics = &self.replica.metrics;
        match self.replica.store.get(key)? {
            Some(record) => {
                metrics.reads_served.inc();
                Ok(record)
            }
            None => {
                metrics.reads_not_found.inc();
                Err(Error::NotFound(key.to_string()))
            }
        }
    }

    async fn local_read(&self, key: &str) -> Result<Record> {
        self.replica.local_read(key).await
    }

    async fn apply_replica(&self, key: &str, value: &str, version: u64) -> Result<u64> {
        self.replica.apply(key, value, version).await
    }
}

// ---------------------------------------------------------------------------
// Leaderless
// ---------------------------------------------------------------------------

pub struct Leaderless<C: ReplicaClient> {
    engine: QuorumEngine<C>,
    replica: LocalReplica,
}

impl<C: ReplicaClient> Leaderless<C> {
    pub fn new(
        engine: QuorumEngine<C>,
        latency: Arc<dyn LatencyModel>,
        metrics: Arc<NodeMetrics>,
    ) -> Self {
        let replica = LocalReplica {
            node_id: engine.node_id().to_string(),
            store: engine.store().clone(),
            latency,
            metrics,
        };
        Self { engine, replica }
    }
}

#[async_trait]
impl<C: ReplicaClient> Coordinator for Leaderless<C> {
    fn node_id(&self) -> &str {
        &self.replica.node_id
    }

    fn role(&self) -> NodeRole {
        NodeRole::Peer
    }

    fn store(&self) -> &Arc<VersionedStore> {
        &self.replica.store
    }

    fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.replica.metrics
    }

    async fn write(&self, key: &str, value: &str) -> Result<WriteAck> {
        self.engine.write(key, value).await
    }

    async fn read(&self, key: &str) -> Result<Record> {
        self.engine.read(key).await
    }

    async fn local_read(&self, key: &str) -> Result<Record> {
        self.replica.local_read(key).await
    }

    async fn apply_replica(&self, key: &str, value: &str, version: u64) -> Result<u64> {
        self.replica.apply(key, value, version).await
    }
}

/// Build the coordinator for `config.role`, replicating over HTTP
pub fn build_coordinator(
    config: &Config,
    store: Arc<VersionedStore>,
    metrics: Arc<NodeMetrics>,
) -> Result<Arc<dyn Coordinator>> {
    let latency: Arc<dyn LatencyModel> = Arc::new(FixedLatency::from(&config.latency));
    build_with_latency(config, store, latency, metrics)
}

/// Same as [`build_coordinator`] with an explicit latency model
pub fn build_with_latency(
    config: &Config,
    store: Arc<VersionedStore>,
    latency: Arc<dyn LatencyModel>,
    metrics: Arc<NodeMetrics>,
) -> Result<Arc<dyn Coordinator>> {
    if config.role == NodeRole::Follower {
        return Ok(Arc::new(Follower::new(
            config.node_id.clone(),
            store,
            latency,
            metrics,
        )));
    }

    let client = Arc::new(HttpReplicaClient::new(
        config.request_timeout(),
        latency.clone(),
    )?);
    let quorum = QuorumConfig {
        write_quorum: config.write_quorum,
        read_quorum: config.read_quorum,
        peers: config.peers.clone(),
        background_fanout: config.background_fanout(),
    };
    let engine = QuorumEngine::new(
        config.node_id.clone(),
        store,
        client,
        quorum,
        metrics.clone(),
    )?;

    let coordinator: Arc<dyn Coordinator> = match config.role {
        NodeRole::Leader => Arc::new(Leader::new(engine, latency, metrics)),
        _ => Arc::new(Leaderless::new(engine, latency, metrics)),
    };
    Ok(coordinator)
}
