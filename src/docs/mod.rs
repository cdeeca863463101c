use utoipa::OpenApi;
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Service metadata
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service name, version and real-time path", body = RootResponse)
    )
)]
#[allow(dead_code)]
pub async fn root_doc() {}

/// Current lock on a drawing
#[utoipa::path(
    get,
    path = "/api/v1/drawings/{drawing_id}/lock",
    params(("drawing_id" = String, Path, description = "Drawing identifier")),
    responses(
        (status = 200, description = "Lock state", body = LockStatusResponse)
    )
)]
#[allow(dead_code)]
pub async fn lock_status_doc() {}

/// Acquire or refresh the edit lock on a drawing
#[utoipa::path(
    post,
    path = "/api/v1/drawings/{drawing_id}/lock",
    params(("drawing_id" = String, Path, description = "Drawing identifier")),
    request_body = LockRequest,
    responses(
        (status = 200, description = "Lock held by the caller", body = DrawingLock),
        (status = 400, description = "Blank drawing or user id", body = ErrorResponse),
        (status = 409, description = "Locked by another user", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn lock_acquire_doc() {}

/// Release the edit lock on a drawing
#[utoipa::path(
    delete,
    path = "/api/v1/drawings/{drawing_id}/lock",
    params(("drawing_id" = String, Path, description = "Drawing identifier")),
    request_body = LockRequest,
    responses(
        (status = 200, description = "Lock released", body = LockReleaseResponse),
        (status = 404, description = "Drawing is not locked", body = ErrorResponse),
        (status = 409, description = "Locked by another user", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn lock_release_doc() {}

/// Relay diagnostics
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Connection, room and lock counts", body = DiagnosticsResponse)
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

/// Open a long-polling session
#[utoipa::path(
    post,
    path = "/ws/poll",
    responses(
        (status = 200, description = "Session opened", body = PollOpenResponse)
    )
)]
#[allow(dead_code)]
pub async fn poll_open_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        root_doc,
        lock_status_doc,
        lock_acquire_doc,
        lock_release_doc,
        diagnostics_doc,
        poll_open_doc,
    ),
    components(
        schemas(
            HealthResponse,
            RootResponse,
            DrawingLock,
            LockRequest,
            LockStatusResponse,
            LockReleaseResponse,
            DiagnosticsResponse,
            PollOpenResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "api", description = "Drawing lock relay endpoints")
    )
)]
pub struct ApiDoc;
