//! A quorumkv node: HTTP API on top of a role-specific coordinator

pub mod http;
pub mod server;

pub use http::{create_router, HealthResponse, NodeState, SetRequest, SetResponse};
pub use server::NodeServer;
