//! HTTP API for a quorumkv node
//!
//! Client endpoints:
//! - `POST /set` `{key, value}` → 201 `{version, coordinator}`
//! - `GET /get/:key` → 200 `{value, version, node}`
//!
//! Peer and diagnostic endpoints:
//! - `POST /replicate` `{key, value, version}` → 201
//! - `GET /local_read/:key` → this node's own record, no quorum
//! - `GET /health`, `GET /metrics`

use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::{NodeMetrics, Result};
use crate::coordinator::{Coordinator, ReplicateRequest, ValueResponse};
use crate::store::Record;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct NodeState {
    pub coordinator: Arc<dyn Coordinator>,
    pub metrics: Arc<NodeMetrics>,
}

impl NodeState {
    pub fn new(coordinator: Arc<dyn Coordinator>) -> Self {
        let metrics = coordinator.metrics().clone();
        Self {
            coordinator,
            metrics,
        }
    }
}

/// Body of `POST /set`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: String,
}

/// Response of `POST /set`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetResponse {
    pub version: u64,
    pub coordinator: String,
}

/// Response of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub role: String,
    pub topology: String,
}

/// Creates the HTTP router with all node endpoints
pub fn create_router(state: NodeState) -> Router {
    Router::new()
        // Client operations
        .route("/set", axum::routing::post(set_key))
        .route("/get/:key", axum::routing::get(get_key))
        // Peer operations
        .route("/replicate", axum::routing::post(replicate))
        .route("/local_read/:key", axum::routing::get(local_read))
        // Diagnostics
        .route("/health", axum::routing::get(health))
        .route("/metrics", axum::routing::get(metrics))
        .layer(axum::middleware::from_fn(request_tracing_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

fn value_response(record: Record, node: &str) -> Json<ValueResponse> {
    Json(ValueResponse {
        value: record.value,
        version: record.version,
        node: node.to_string(),
    })
}

async fn set_key(
    State(state): State<NodeState>,
    Json(req): Json<SetRequest>,
) -> Result<impl IntoResponse> {
    let ack = state.coordinator.write(&req.key, &req.value).await?;
    Ok((
        StatusCode::CREATED,
        Json(SetResponse {
            version: ack.version,
            coordinator: state.coordinator.node_id().to_string(),
        }),
    ))
}

async fn get_key(
    State(state): State<NodeState>,
    Path(key): Path<String>,
) -> Result<Json<ValueResponse>> {
    let record = state.coordinator.read(&key).await?;
    Ok(value_response(record, state.coordinator.node_id()))
}

async fn replicate(
    State(state): State<NodeState>,
    Json(req): Json<ReplicateRequest>,
) -> Result<impl IntoResponse> {
    state
        .coordinator
        .apply_replica(&req.key, &req.value, req.version)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "replicated",
            "node": state.coordinator.node_id(),
        })),
    ))
}

async fn local_read(
    State(state): State<NodeState>,
    Path(key): Path<String>,
) -> Result<Json<ValueResponse>> {
    let record = state.coordinator.local_read(&key).await?;
    Ok(value_response(record, state.coordinator.node_id()))
}

async fn health(State(state): State<NodeState>) -> Json<HealthResponse> {
    let role = state.coordinator.role();
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.coordinator.node_id().to_string(),
        role: role.to_string(),
        topology: role.topology().to_string(),
    })
}

async fn metrics(State(state): State<NodeState>) -> impl IntoResponse {
    let mut out = state.metrics.to_prometheus(state.coordinator.node_id());
    match state.coordinator.store().len() {
        Ok(keys) => out.push_str(&format!(
            "quorumkv_keys{{node=\"{}\"}} {}\n",
            state.coordinator.node_id(),
            keys
        )),
        Err(e) => tracing::warn!("Failed to count keys: {}", e),
    }
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        out,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Config, NoLatency, NodeRole};
    use crate::coordinator::build_with_latency;
    use crate::store::VersionedStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn router(role: NodeRole) -> Router {
        let config = Config {
            node_id: "node1".into(),
            role,
            ..Config::default()
        };
        let coordinator = build_with_latency(
            &config,
            Arc::new(VersionedStore::in_memory()),
            Arc::new(NoLatency),
            Arc::new(NodeMetrics::new()),
        )
        .unwrap();
        create_router(NodeState::new(coordinator))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let app = router(NodeRole::Peer);

        let resp = app
            .clone()
            .oneshot(post_json("/set", json!({"key": "k", "value": "v"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = json_body(resp).await;
        assert_eq!(body["version"], 1);
        assert_eq!(body["coordinator"], "node1");

        let resp = app.oneshot(get("/get/k")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["value"], "v");
        assert_eq!(body["version"], 1);
        assert_eq!(body["node"], "node1");
    }

    #[tokio::test]
    async fn test_get_missing_is_404() {
        let app = router(NodeRole::Peer);
        let resp = app.clone().oneshot(get("/get/missing")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app.oneshot(get("/local_read/missing")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_key_is_400() {
        let app = router(NodeRole::Peer);
        let resp = app
            .oneshot(post_json("/set", json!({"key": "", "value": "v"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_follower_set_is_forbidden() {
        let app = router(NodeRole::Follower);
        let resp = app
            .oneshot(post_json("/set", json!({"key": "k", "value": "v"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_replicate_then_local_read() {
        let app = router(NodeRole::Follower);
        let resp = app
            .clone()
            .oneshot(post_json(
                "/replicate",
                json!({"key": "k", "value": "v", "version": 6}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(json_body(resp).await["status"], "replicated");

        let resp = app.oneshot(get("/local_read/k")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["version"], 6);
    }

    #[tokio::test]
    async fn test_leader_replicate_is_forbidden() {
        let app = router(NodeRole::Leader);
        let resp = app
            .oneshot(post_json(
                "/replicate",
                json!({"key": "k", "value": "v", "version": 2}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_health_reports_role_and_topology() {
        let resp = router(NodeRole::Leader)
            .oneshot(get("/health"))
            .await
            .unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["role"], "leader");
        assert_eq!(body["topology"], "leader-follower");

        let resp = router(NodeRole::Peer).oneshot(get("/health")).await.unwrap();
        assert_eq!(json_body(resp).await["topology"], "leaderless");
    }

    #[tokio::test]
    async fn test_request_id_is_set() {
        let resp = router(NodeRole::Peer)
            .oneshot(get("/health"))
            .await
            .unwrap();
        assert!(resp.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        let app = router(NodeRole::Peer);
        app.clone()
            .oneshot(post_json("/set", json!({"key": "k", "value": "v"})))
            .await
            .unwrap();

        let resp = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("quorumkv_keys{node=\"node1\"} 1"));
    }
}
