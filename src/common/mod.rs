//! Common utilities and types shared across quorumkv

pub mod config;
pub mod error;
pub mod latency;
pub mod metrics;
pub mod tracing_middleware;
pub mod utils;

pub use config::{BackendKind, Config, LatencyConfig, NodeRole, StorageConfig};
pub use error::{Error, Result};
pub use latency::{pause, FixedLatency, LatencyModel, NoLatency};
pub use metrics::NodeMetrics;
pub use utils::{encode_key, peer_url, validate_key};
