//! # quorumkv
//!
//! A replicated key-value store with tunable consistency:
//! - Write quorum (W) and read quorum (R) chosen per deployment
//! - Leader-follower or leaderless topology
//! - Per-node version counters, highest version wins on read
//! - Simulated network/apply/read latencies to expose the replication window
//!
//! ## Architecture
//!
//! ```text
//!          client                          client
//!            │ /set, /get                    │ /set, /get (any node)
//! ┌──────────▼──────────┐        ┌───────────▼─────────┐
//! │ Leader              │        │ Peer (coordinator)  │
//! │  local write = ack 1│        │  local write = ack 1│
//! └───┬────────┬────────┘        └───┬────────┬────────┘
//!     │        │ /replicate          │        │ /replicate, /local_read
//! ┌───▼──┐ ┌───▼──┐              ┌───▼──┐ ┌───▼──┐
//! │Follwr│ │Follwr│              │ Peer │ │ Peer │
//! └──────┘ └──────┘              └──────┘ └──────┘
//!   leader-follower                  leaderless
//! ```
//!
//! With `W + R > N` every read quorum intersects every write quorum.
//!
//! ## Usage
//!
//! ### Start a leaderless node
//! ```bash
//! quorumkv-node serve \
//!   --id node1 \
//!   --bind 0.0.0.0:8080 \
//!   --role peer \
//!   --peers http://node2:8080,http://node3:8080 \
//!   --write-quorum 2 --read-quorum 2
//! ```
//!
//! ### Use the CLI
//! ```bash
//! quorumkv --nodes http://localhost:8080 set my-key my-value
//! quorumkv --nodes http://localhost:8080 get my-key
//! quorumkv --nodes http://localhost:8081 local-read my-key
//! quorumkv --nodes http://localhost:8080,http://localhost:8081 probe
//! ```

#![allow(clippy::result_large_err)]

pub mod client;
pub mod common;
pub mod coordinator;
pub mod node;
pub mod store;

// Re-export commonly used types
pub use client::KvClient;
pub use common::{Config, Error, NodeRole, Result};
pub use coordinator::Coordinator;
pub use node::NodeServer;
pub use store::{Record, VersionedStore};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
