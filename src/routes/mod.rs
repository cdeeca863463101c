pub mod api;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::OpenApi;

use crate::config::Config;
use crate::docs::ApiDoc;
use crate::handlers::{health_check, ready_check, root};
use crate::state::AppState;
use crate::websocket::{poll_close, poll_open, poll_receive, poll_send, websocket_handler};

/// Full router of the relay: metadata, health, the real-time channel with its
/// polling fallback, and the API under `/api`.
pub fn create_router(state: Arc<AppState>) -> Router {
    let ws_route = state.config.ws_route();
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route(&ws_route, get(websocket_handler))
        .route(&format!("{}/poll", ws_route), post(poll_open))
        .route(
            &format!("{}/poll/:sid", ws_route),
            get(poll_receive).post(poll_send).delete(poll_close),
        )
        .nest("/api", api::create_api_routes())
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origin_list()
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        if config.is_development() {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
        }
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
