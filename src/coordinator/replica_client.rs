//! Point-to-point calls from a coordinator to one peer.
//!
//! The trait keeps the quorum engine testable without sockets; the HTTP
//! implementation talks to the peer's `/replicate` and `/local_read`
//! endpoints. Failures are reported to the caller and never retried here.

use crate::common::{encode_key, pause, peer_url, Error, LatencyModel, Result};
use crate::store::Record;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Body of `POST /replicate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicateRequest {
    pub key: String,
    pub value: String,
    pub version: u64,
}

/// Body returned by `GET /get/{key}` and `GET /local_read/{key}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueResponse {
    pub value: String,
    pub version: u64,
    pub node: String,
}

/// Transport for replica RPCs
#[async_trait]
pub trait ReplicaClient: Send + Sync + 'static {
    /// Ask `peer` to store `value` under exactly `version`
    async fn replicate(&self, peer: &str, key: &str, value: &str, version: u64) -> Result<()>;

    /// Fetch the peer's local, non-quorum view of `key`
    async fn read_remote(&self, peer: &str, key: &str) -> Result<Option<Record>>;
}

/// HTTP replica client
#[derive(Debug, Clone)]
pub struct HttpReplicaClient {
    http: reqwest::Client,
    latency: Arc<dyn LatencyModel>,
}

impl HttpReplicaClient {
    /// `timeout` bounds every call, including connection setup
    pub fn new(timeout: Duration, latency: Arc<dyn LatencyModel>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, latency })
    }
}

fn unreachable(peer: &str, reason: impl ToString) -> Error {
    Error::PeerUnreachable {
        peer: peer.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl ReplicaClient for HttpReplicaClient {
    async fn replicate(&self, peer: &str, key: &str, value: &str, version: u64) -> Result<()> {
        pause(self.latency.network_delay()).await;

        let body = ReplicateRequest {
            key: key.to_string(),
            value: value.to_string(),
            version,
        };
        let resp = self
            .http
            .post(peer_url(peer, "/replicate"))
            .json(&body)
            .send()
            .await
            .map_err(|e| unreachable(peer, e))?;

        if resp.status() != StatusCode::CREATED {
            return Err(unreachable(
                peer,
                format!("replication failed with status {}", resp.status()),
            ));
        }

        Ok(())
    }

    async fn read_remote(&self, peer: &str, key: &str) -> Result<Option<Record>> {
        let url = peer_url(peer, &format!("/local_read/{}", encode_key(key)));
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| unreachable(peer, e))?;

        match resp.status() {
            StatusCode::OK => {
                let body: ValueResponse = resp.json().await.map_err(|e| unreachable(peer, e))?;
                Ok(Some(Record {
                    value: body.value,
                    version: body.version,
                }))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(unreachable(
                peer,
                format!("remote read failed with status {}", status),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::NoLatency;

    /// Bound but never accepting, so every call runs into the timeout
    async fn silent_peer() -> (tokio::net::TcpListener, String) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    #[tokio::test]
    async fn test_unreachable_peer() {
        let client =
            HttpReplicaClient::new(Duration::from_millis(500), Arc::new(NoLatency)).unwrap();
        let (_listener, peer) = silent_peer().await;

        let err = client.replicate(&peer, "k", "v", 1).await.unwrap_err();
        assert!(matches!(err, Error::PeerUnreachable { .. }));
        assert!(err.is_retryable());

        let err = client.read_remote(&peer, "k").await.unwrap_err();
        match err {
            Error::PeerUnreachable { peer: failed, .. } => assert_eq!(failed, peer),
            other => panic!("expected PeerUnreachable, got {:?}", other),
        }
    }
}
