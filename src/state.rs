use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::Config;
use crate::services::LockService;
use crate::ws::{LockHub, PollSessions};

/// Shared state of the relay server
pub struct AppState {
    pub config: Config,
    pub hub: Arc<LockHub>,
    pub locks: LockService,
    pub poll_sessions: PollSessions,
    /// Open WebSocket connections
    pub ws_connections: AtomicUsize,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        let hub = Arc::new(LockHub::new(config.broadcast_capacity));
        let locks = LockService::new(hub.clone(), config.lock_timeout());
        let poll_sessions = PollSessions::new(config.poll_session_idle());

        Arc::new(Self {
            config,
            hub,
            locks,
            poll_sessions,
            ws_connections: AtomicUsize::new(0),
        })
    }
}

/// Periodically expire locks, evict idle polling sessions and drop empty rooms.
pub fn spawn_maintenance(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.lock_sweep_interval());
        loop {
            interval.tick().await;
            let expired = state.locks.sweep_expired().await;
            state.poll_sessions.run_pending_tasks();
            let pruned = state.hub.prune().await;
            if !expired.is_empty() || pruned > 0 {
                debug!("Maintenance: {} locks expired, {} rooms pruned", expired.len(), pruned);
            }
        }
    })
}
