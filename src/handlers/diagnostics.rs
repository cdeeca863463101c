use crate::{models::{DiagnosticsResponse, ErrorResponse}, state::AppState};
use axum::{extract::State, http::StatusCode, Json};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, OnceLock};
use sysinfo::System;
use tracing::info;

static SYSTEM_MONITOR: OnceLock<Mutex<System>> = OnceLock::new();

/// Relay and host statistics
pub async fn diagnostics(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<DiagnosticsResponse>), (StatusCode, Json<ErrorResponse>)> {
    let n_ws_conn = saturating_u64(state.ws_connections.load(Ordering::SeqCst));
    let n_poll_sessions = state.poll_sessions.count();
    let n_rooms = saturating_u64(state.hub.room_count().await);
    let n_subscriptions = saturating_u64(state.hub.total_subscriptions().await);
    let n_locks = saturating_u64(state.locks.count().await);

    // System stats
    let (cpu_usage, memory_alloc, memory_free, memory_total) = {
        let sys_lock = SYSTEM_MONITOR.get_or_init(|| Mutex::new(System::new_all()));
        match sys_lock.lock() {
            Ok(mut sys) => {
                sys.refresh_cpu();
                sys.refresh_memory();
                (
                    sys.global_cpu_info().cpu_usage(),
                    sys.used_memory(),
                    sys.free_memory(),
                    sys.total_memory(),
                )
            }
            Err(_) => (0.0, 0, 0, 0),
        }
    };

    info!(
        "Diagnostics: CPU: {:.2}%, Mem: {}/{} MB (Free: {} MB), WS: {}, Polling: {}, Rooms: {}, Locks: {}",
        cpu_usage,
        memory_alloc / 1024 / 1024,
        memory_total / 1024 / 1024,
        memory_free / 1024 / 1024,
        n_ws_conn,
        n_poll_sessions,
        n_rooms,
        n_locks
    );

    Ok((
        StatusCode::OK,
        Json(DiagnosticsResponse {
            n_ws_conn,
            n_poll_sessions,
            n_rooms,
            n_subscriptions,
            n_locks,
            cpu_usage,
            memory_alloc,
            memory_total,
            memory_free,
        }),
    ))
}

fn saturating_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}
