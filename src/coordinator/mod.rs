//! Request coordination
//!
//! The coordinator is responsible for:
//! - Write orchestration (local apply, then replication until W acks)
//! - Read orchestration (local or R-response quorum, highest version wins)
//! - Applying replicated writes sent by other coordinators
//! - Enforcing which topology roles may coordinate

pub mod quorum;
pub mod replica_client;
pub mod topology;

pub use quorum::{resolve_latest, QuorumConfig, QuorumEngine, WriteAck};
pub use replica_client::{HttpReplicaClient, ReplicaClient, ReplicateRequest, ValueResponse};
pub use topology::{build_coordinator, build_with_latency, Follower, Leader, Leaderless};

use crate::common::{NodeMetrics, NodeRole, Result};
use crate::store::{Record, VersionedStore};
use async_trait::async_trait;
use std::sync::Arc;

/// A node's request-handling behavior, fixed by its role at startup
#[async_trait]
pub trait Coordinator: Send + Sync + 'static {
    fn node_id(&self) -> &str;

    fn role(&self) -> NodeRole;

    fn store(&self) -> &Arc<VersionedStore>;

    fn metrics(&self) -> &Arc<NodeMetrics>;

    /// Client write (`/set`)
    async fn write(&self, key: &str, value: &str) -> Result<WriteAck>;

    /// Client read (`/get`)
    async fn read(&self, key: &str) -> Result<Record>;

    /// This node's own record, bypassing any quorum (`/local_read`)
    async fn local_read(&self, key: &str) -> Result<Record>;

    /// Store a write coordinated elsewhere under its version (`/replicate`)
    async fn apply_replica(&self, key: &str, value: &str, version: u64) -> Result<u64>;
}
