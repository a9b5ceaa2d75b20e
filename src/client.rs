//! Typed HTTP client for quorumkv nodes
//!
//! ```no_run
//! # async fn demo() -> quorumkv::Result<()> {
//! use quorumkv::client::KvClient;
//!
//! let node = KvClient::new("http://localhost:8080")?;
//! let ack = node.set("user:1", "alice").await?;
//! let latest = node.get("user:1").await?;
//! assert_eq!(latest.map(|r| r.version), Some(ack.version));
//! # Ok(())
//! # }
//! ```

use crate::common::{encode_key, peer_url, Error, Result};
use crate::coordinator::ValueResponse;
use crate::node::{HealthResponse, SetRequest, SetResponse};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Default timeout for client calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client bound to one node
#[derive(Debug, Clone)]
pub struct KvClient {
    http: reqwest::Client,
    base_url: String,
}

impl KvClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Write through this node. Fails with `Forbidden` on a follower.
    pub async fn set(&self, key: &str, value: &str) -> Result<SetResponse> {
        let body = SetRequest {
            key: key.to_string(),
            value: value.to_string(),
        };
        let resp = self
            .http
            .post(peer_url(&self.base_url, "/set"))
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Read through this node's read quorum
    pub async fn get(&self, key: &str) -> Result<Option<ValueResponse>> {
        self.fetch(&format!("/get/{}", encode_key(key))).await
    }

    /// This node's own record, without any quorum
    pub async fn local_read(&self, key: &str) -> Result<Option<ValueResponse>> {
        self.fetch(&format!("/local_read/{}", encode_key(key))).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self
            .http
            .get(peer_url(&self.base_url, "/health"))
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    async fn fetch(&self, path: &str) -> Result<Option<ValueResponse>> {
        let resp = self.http.get(peer_url(&self.base_url, path)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp).await?;
        Ok(Some(resp.json().await?))
    }
}

/// Map a non-success response to an error carrying its body
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    match status {
        StatusCode::FORBIDDEN => Err(Error::Forbidden(body)),
        _ => Err(Error::Http(format!("status {}: {}", status.as_u16(), body))),
    }
}

/// What the observers saw while one write was in flight
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbeReport {
    /// Version assigned to the probe write
    pub version: u64,
    /// Time until the coordinator acknowledged the write
    pub write_latency_ms: u64,
    /// Total `local_read` calls made against observers
    pub observations: usize,
    /// Observations where the key was missing or held an older value
    pub stale: usize,
    /// Observations that failed outright
    pub errors: usize,
    /// Stale observations per observer URL, in observer order
    pub stale_by_node: Vec<(String, usize)>,
}

impl ProbeReport {
    pub fn saw_inconsistency(&self) -> bool {
        self.stale > 0
    }
}

/// Write `key` through `coordinator` while polling `local_read` on every
/// observer, for `window` or until the write is acknowledged, whichever is
/// later. Each observation that does not show `value` counts as stale.
pub async fn probe_replication_window(
    coordinator: &KvClient,
    observers: &[KvClient],
    key: &str,
    value: &str,
    window: Duration,
    poll_interval: Duration,
) -> Result<ProbeReport> {
    let started = Instant::now();
    let write = {
        let coordinator = coordinator.clone();
        let key = key.to_string();
        let value = value.to_string();
        tokio::spawn(async move {
            let result = coordinator.set(&key, &value).await;
            (result, started.elapsed())
        })
    };

    let mut report = ProbeReport {
        stale_by_node: observers
            .iter()
            .map(|o| (o.base_url().to_string(), 0))
            .collect(),
        ..Default::default()
    };

    while started.elapsed() < window || !write.is_finished() {
        for (i, observer) in observers.iter().enumerate() {
            report.observations += 1;
            match observer.local_read(key).await {
                Ok(Some(seen)) if seen.value == value => {}
                Ok(_) => {
                    report.stale += 1;
                    report.stale_by_node[i].1 += 1;
                }
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(node = %observer.base_url(), error = %e, "Probe read failed");
                }
            }
        }
        tokio::time::sleep(poll_interval).await;
    }

    let (result, latency) = write
        .await
        .map_err(|e| Error::Internal(format!("probe write task failed: {}", e)))?;
    let ack = result?;
    report.version = ack.version;
    report.write_latency_ms = latency.as_millis() as u64;

    tracing::info!(
        version = report.version,
        observations = report.observations,
        stale = report.stale,
        "Replication window probe finished"
    );
    Ok(report)
}
