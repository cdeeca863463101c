use crate::{handlers::{diagnostics, lock_acquire, lock_release, lock_status}, state::AppState};
use axum::{routing::get, Router};
use std::sync::Arc;

/// Create API routes
pub fn create_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/diagnostics", get(diagnostics))
        .route(
            "/v1/drawings/:drawing_id/lock",
            get(lock_status).post(lock_acquire).delete(lock_release),
        )
}
