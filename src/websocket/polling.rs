use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::debug;

use crate::models::{ApiError, ClientMessage, ErrorResponse, PollOpenResponse, ServerMessage};
use crate::state::AppState;
use crate::websocket::handler::handle_client_message;
use crate::ws::PollSession;

/// Open a long-polling session
pub async fn poll_open(State(state): State<Arc<AppState>>) -> (StatusCode, Json<PollOpenResponse>) {
    let session = state.poll_sessions.open();
    (
        StatusCode::OK,
        Json(PollOpenResponse {
            sid: session.id.clone(),
        }),
    )
}

/// Wait for frames queued for the session
pub async fn poll_receive(
    State(state): State<Arc<AppState>>,
    Path(sid): Path<String>,
) -> Result<Json<Vec<ServerMessage>>, ApiError> {
    let session = find_session(&state, &sid)?;
    let frames = session.drain(state.config.poll_wait()).await;
    debug!("Polling session {} received {} frames", sid, frames.len());
    Ok(Json(frames))
}

/// Deliver one client frame
pub async fn poll_send(
    State(state): State<Arc<AppState>>,
    Path(sid): Path<String>,
    Json(message): Json<ClientMessage>,
) -> Result<StatusCode, ApiError> {
    let session = find_session(&state, &sid)?;
    let mut subscriptions = session.subscriptions.lock().await;
    handle_client_message(&state, &sid, &mut subscriptions, message).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Close the session and leave all its rooms
pub async fn poll_close(
    State(state): State<Arc<AppState>>,
    Path(sid): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.poll_sessions.close(&sid).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(unknown_session(&sid))
    }
}

fn find_session(state: &AppState, sid: &str) -> Result<Arc<PollSession>, ApiError> {
    state.poll_sessions.get(sid).ok_or_else(|| unknown_session(sid))
}

fn unknown_session(sid: &str) -> ApiError {
    ErrorResponse::reply(StatusCode::NOT_FOUND, format!("Unknown polling session '{}'", sid))
}
