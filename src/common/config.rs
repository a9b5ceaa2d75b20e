//! Configuration for quorumkv nodes
//!
//! Values are layered: defaults, then an optional TOML file named by
//! `QUORUMKV_CONFIG`, then `QUORUMKV_*` environment variables. The node
//! binary applies CLI flags on top.

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable pointing at a TOML config file
pub const CONFIG_PATH_ENV: &str = "QUORUMKV_CONFIG";

/// Prefix for environment overrides (`QUORUMKV_WRITE_QUORUM=3`)
pub const ENV_PREFIX: &str = "QUORUMKV";

/// Node configuration, fixed for the lifetime of the process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Node ID (unique identifier)
    pub node_id: String,

    /// Bind address for the HTTP API
    pub bind_addr: SocketAddr,

    /// Role of this node in its topology
    pub role: NodeRole,

    /// Ordered peer base URLs (followers for a leader, other nodes for a peer)
    pub peers: Vec<String>,

    /// Write quorum (W), including the coordinator itself
    pub write_quorum: usize,

    /// Read quorum (R), including the coordinator itself
    pub read_quorum: usize,

    /// Replicate in the background when W=1. Defaults per topology when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_fanout: Option<bool>,

    /// Artificial latencies that make the replication window observable
    pub latency: LatencyConfig,

    /// Per peer call timeout
    pub request_timeout_ms: u64,

    /// Storage backend
    pub storage: StorageConfig,

    /// Logging level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: "node1".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            role: NodeRole::Peer,
            peers: Vec::new(),
            write_quorum: 1,
            read_quorum: 1,
            background_fanout: None,
            latency: LatencyConfig::default(),
            request_timeout_ms: 2_000,
            storage: StorageConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// The single coordinator of a leader-follower deployment
    Leader,
    /// Receives replicated writes from the leader, serves local reads
    Follower,
    /// Symmetric member of a leaderless deployment
    Peer,
}

impl NodeRole {
    /// Can this node coordinate client writes?
    pub fn can_coordinate(&self) -> bool {
        matches!(self, NodeRole::Leader | NodeRole::Peer)
    }

    pub fn topology(&self) -> &'static str {
        match self {
            NodeRole::Leader | NodeRole::Follower => "leader-follower",
            NodeRole::Peer => "leaderless",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Leader => "leader",
            NodeRole::Follower => "follower",
            NodeRole::Peer => "peer",
        }
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "leader" => Ok(NodeRole::Leader),
            "follower" => Ok(NodeRole::Follower),
            "peer" | "leaderless" => Ok(NodeRole::Peer),
            other => Err(Error::InvalidConfig(format!("unknown role: {}", other))),
        }
    }
}

/// Simulated latencies, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Slept by the coordinator before each replication call
    pub network_delay_ms: u64,
    /// Slept by a peer before applying a replicated write
    pub apply_delay_ms: u64,
    /// Slept by a peer before serving a local read
    pub read_delay_ms: u64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            network_delay_ms: 200,
            apply_delay_ms: 100,
            read_delay_ms: 50,
        }
    }
}

impl LatencyConfig {
    pub fn zero() -> Self {
        Self {
            network_delay_ms: 0,
            apply_delay_ms: 0,
            read_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Sled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// Data directory, required by durable backends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `QUORUMKV_CONFIG` (if set) and the environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_layers(file.as_deref(), true)
    }

    /// Load configuration from a single TOML file, ignoring the environment
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::load_layers(Some(path), false)
    }

    fn load_layers(file: Option<&Path>, with_env: bool) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        if with_env {
            builder = builder.add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("peers")
                    .try_parsing(true),
            );
        }

        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Total replica count N, including this node
    pub fn replica_count(&self) -> usize {
        self.peers.len() + 1
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Whether a W=1 write replicates in the background
    pub fn background_fanout(&self) -> bool {
        self.background_fanout
            .unwrap_or(matches!(self.role, NodeRole::Peer))
    }

    /// Check quorum bounds and peer list before the node starts
    pub fn validate(&self) -> Result<()> {
        if self.node_id.trim().is_empty() {
            return Err(Error::InvalidConfig("node_id cannot be empty".into()));
        }

        let mut seen = HashSet::new();
        for peer in &self.peers {
            if peer.trim().is_empty() {
                return Err(Error::InvalidConfig("peer address cannot be empty".into()));
            }
            if !seen.insert(peer.trim_end_matches('/')) {
                return Err(Error::InvalidConfig(format!("duplicate peer: {}", peer)));
            }
        }

        if self.role.can_coordinate() {
            let n = self.replica_count();
            check_quorum("write_quorum", self.write_quorum, n)?;
            check_quorum("read_quorum", self.read_quorum, n)?;
        }

        if self.storage.backend == BackendKind::Sled && self.storage.path.is_none() {
            return Err(Error::InvalidConfig(
                "storage.path is required for the sled backend".into(),
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "request_timeout_ms must be positive".into(),
            ));
        }

        Ok(())
    }
}

fn check_quorum(name: &str, value: usize, n: usize) -> Result<()> {
    if value == 0 || value > n {
        return Err(Error::InvalidConfig(format!(
            "{} must be between 1 and {} (N), got {}",
            name, n, value
        )));
    }
    Ok(())
}
