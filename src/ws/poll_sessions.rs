use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tokio::sync::{mpsc, Mutex};
use tracing::info;
use uuid::Uuid;

use super::subscriptions::ConnectionSubscriptions;
use crate::models::ServerMessage;

/// Most frames handed out by a single poll
const MAX_POLL_BATCH: usize = 64;

/// Server side of one long-polling client
pub struct PollSession {
    pub id: String,
    inbound: Mutex<mpsc::UnboundedReceiver<ServerMessage>>,
    pub subscriptions: Mutex<ConnectionSubscriptions>,
}

impl PollSession {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            id: Uuid::new_v4().to_string(),
            inbound: Mutex::new(rx),
            subscriptions: Mutex::new(ConnectionSubscriptions::new(tx)),
        }
    }

    /// Wait up to `wait` for the first frame, then take whatever else is queued.
    pub async fn drain(&self, wait: Duration) -> Vec<ServerMessage> {
        let mut inbound = self.inbound.lock().await;
        let mut frames = Vec::new();

        match tokio::time::timeout(wait, inbound.recv()).await {
            Ok(Some(first)) => frames.push(first),
            _ => return frames,
        }
        while frames.len() < MAX_POLL_BATCH {
            match inbound.try_recv() {
                Ok(next) => frames.push(next),
                Err(_) => break,
            }
        }
        frames
    }
}

/// Open polling sessions, dropped after a period without requests
pub struct PollSessions {
    cache: Cache<String, Arc<PollSession>>,
}

impl PollSessions {
    pub fn new(idle: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(idle)
                .build(),
        }
    }

    pub fn open(&self) -> Arc<PollSession> {
        let session = Arc::new(PollSession::new());
        self.cache.insert(session.id.clone(), session.clone());
        info!("Polling session {} opened", session.id);
        session
    }

    pub fn get(&self, sid: &str) -> Option<Arc<PollSession>> {
        self.cache.get(sid)
    }

    /// Remove the session and leave its rooms. A long-poll still holding the
    /// session sees no further frames.
    pub async fn close(&self, sid: &str) -> bool {
        let Some(session) = self.cache.remove(sid) else {
            return false;
        };
        session.subscriptions.lock().await.clear();
        info!("Polling session {} closed", sid);
        true
    }

    pub fn count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Apply pending evictions so idle sessions release their rooms
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}
