use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::debug;

use crate::models::{HealthResponse, RootResponse};
use crate::state::AppState;

/// Service metadata
pub async fn root(State(state): State<Arc<AppState>>) -> Json<RootResponse> {
    Json(RootResponse {
        name: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ws_path: state.config.ws_route(),
    })
}

/// Liveness probe: answers as long as the process serves requests
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse::ok(format!("{} is running", state.config.service_name)))
}

/// Readiness probe.
///
/// Locks and rooms live in memory; the relay is ready once its lock registry
/// answers.
pub async fn ready_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let locks = state.locks.count().await;
    let rooms = state.hub.room_count().await;
    debug!("Readiness check: {} locks, {} rooms", locks, rooms);
    Json(HealthResponse::ok(format!("{} locks held, {} rooms open", locks, rooms)))
}
