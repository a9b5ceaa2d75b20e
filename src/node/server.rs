//! Node server

use crate::common::{Config, NodeMetrics, Result};
use crate::coordinator::{build_coordinator, Coordinator};
use crate::node::http::{create_router, NodeState};
use crate::store::VersionedStore;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Process wiring for one node: store, coordinator, router, listener
pub struct NodeServer {
    config: Config,
    coordinator: Arc<dyn Coordinator>,
}

impl NodeServer {
    /// Validate `config` and build the store and coordinator for its role
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(VersionedStore::open(&config.storage)?);
        let metrics = Arc::new(NodeMetrics::new());
        let coordinator = build_coordinator(&config, store, metrics)?;
        Ok(Self::with_coordinator(config, coordinator))
    }

    /// Serve an already built coordinator
    pub fn with_coordinator(config: Config, coordinator: Arc<dyn Coordinator>) -> Self {
        Self {
            config,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &Arc<dyn Coordinator> {
        &self.coordinator
    }

    /// Bind `bind_addr` and serve until Ctrl-C
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener, shutdown_signal()).await
    }

    /// Serve on an existing listener until `shutdown` resolves
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        let config = &self.config;

        tracing::info!("Starting node: {} (quorumkv {})", config.node_id, crate::VERSION);
        tracing::info!("  HTTP API: {}", addr);
        tracing::info!("  Role: {} ({})", config.role, config.role.topology());
        if config.role.can_coordinate() {
            tracing::info!(
                "  Quorum: N={} W={} R={}",
                config.replica_count(),
                config.write_quorum,
                config.read_quorum
            );
            if config.write_quorum + config.read_quorum <= config.replica_count() {
                tracing::warn!(
                    "W + R <= N: reads may miss the latest acknowledged write"
                );
            }
        }
        for peer in &config.peers {
            tracing::info!("  Peer: {}", peer);
        }

        let router = create_router(NodeState::new(self.coordinator.clone()));

        tracing::info!("✓ Node ready");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Node {} stopped", config.node_id);
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
