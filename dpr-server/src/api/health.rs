//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub backend: BackendHealth,
}

#[derive(Debug, Serialize)]
pub struct BackendHealth {
    pub source: String,
    pub reachable: bool,
}

/// GET /health
///
/// Reports the service as up even when the graph store is not; the backend
/// status is informational.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let reachable = state.source.health_check().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "dpr-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: BackendHealth {
            source: state.source.name().to_string(),
            reachable,
        },
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
