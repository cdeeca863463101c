use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::warn;

use crate::models::{ApiError, DrawingLock, ErrorResponse, LockReleaseResponse, LockRequest, LockStatusResponse};
use crate::services::LockError;
use crate::state::AppState;

/// Current lock state of a drawing
pub async fn lock_status(
    State(state): State<Arc<AppState>>,
    Path(drawing_id): Path<String>,
) -> Result<(StatusCode, Json<LockStatusResponse>), ApiError> {
    let lock = state.locks.current(&drawing_id).await;
    Ok((
        StatusCode::OK,
        Json(LockStatusResponse {
            drawing_id,
            locked: lock.is_some(),
            lock,
        }),
    ))
}

/// Acquire (or refresh) the edit lock on a drawing
pub async fn lock_acquire(
    State(state): State<Arc<AppState>>,
    Path(drawing_id): Path<String>,
    Json(request): Json<LockRequest>,
) -> Result<(StatusCode, Json<DrawingLock>), ApiError> {
    match state.locks.acquire(&drawing_id, &request.user_id).await {
        Ok(lock) => Ok((StatusCode::OK, Json(lock))),
        Err(e) => Err(lock_error_reply(e)),
    }
}

/// Release the edit lock on a drawing
pub async fn lock_release(
    State(state): State<Arc<AppState>>,
    Path(drawing_id): Path<String>,
    Json(request): Json<LockRequest>,
) -> Result<(StatusCode, Json<LockReleaseResponse>), ApiError> {
    match state.locks.release(&drawing_id, &request.user_id).await {
        Ok(()) => Ok((StatusCode::OK, Json(LockReleaseResponse { success: true }))),
        Err(e) => Err(lock_error_reply(e)),
    }
}

fn lock_error_reply(e: LockError) -> ApiError {
    let status = match &e {
        LockError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        LockError::Held { .. } | LockError::NotHolder { .. } => StatusCode::CONFLICT,
        LockError::NotLocked(_) => StatusCode::NOT_FOUND,
    };
    warn!("Lock request rejected: {}", e);
    ErrorResponse::reply(status, e.to_string())
}
