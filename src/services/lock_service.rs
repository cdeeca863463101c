use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::{DrawingLock, ServerMessage};
use crate::ws::LockHub;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Drawing '{drawing_id}' is locked by '{locked_by}' until {expires_at}")]
    Held {
        drawing_id: String,
        locked_by: String,
        expires_at: DateTime<Utc>,
    },
    #[error("Drawing '{drawing_id}' is locked by '{locked_by}', not by the caller")]
    NotHolder {
        drawing_id: String,
        locked_by: String,
    },
    #[error("Drawing '{0}' is not locked")]
    NotLocked(String),
}

/// Edit locks on drawings.
///
/// Every change of lock ownership is published to the drawing's room in the
/// [`LockHub`]: `drawing_locked` on acquire, `drawing_unlocked` on release or
/// expiry. Refreshing one's own lock is silent.
pub struct LockService {
    locks: RwLock<HashMap<String, DrawingLock>>,
    timeout: chrono::Duration,
    hub: Arc<LockHub>,
}

impl LockService {
    pub fn new(hub: Arc<LockHub>, timeout: Duration) -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
            timeout: chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::days(365)),
            hub,
        }
    }

    pub async fn acquire(&self, drawing_id: &str, user_id: &str) -> Result<DrawingLock, LockError> {
        self.acquire_at(drawing_id, user_id, Utc::now()).await
    }

    pub async fn acquire_at(
        &self,
        drawing_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DrawingLock, LockError> {
        validate(drawing_id, user_id)?;

        let mut locks = self.locks.write().await;
        let refreshed_from = match locks.get(drawing_id) {
            Some(existing) if !existing.is_expired_at(now) => {
                if existing.user_id != user_id {
                    return Err(LockError::Held {
                        drawing_id: drawing_id.to_string(),
                        locked_by: existing.user_id.clone(),
                        expires_at: existing.expires_at,
                    });
                }
                Some(existing.acquired_at)
            }
            _ => None,
        };

        let lock = DrawingLock {
            drawing_id: drawing_id.to_string(),
            user_id: user_id.to_string(),
            acquired_at: refreshed_from.unwrap_or(now),
            expires_at: now + self.timeout,
        };
        locks.insert(drawing_id.to_string(), lock.clone());

        // Published under the write guard: announcements follow lock order.
        if refreshed_from.is_some() {
            debug!("Lock on drawing {} refreshed by {}", drawing_id, user_id);
        } else {
            info!("Drawing {} locked by {}", drawing_id, user_id);
            self.hub
                .publish(drawing_id, ServerMessage::locked(drawing_id, user_id))
                .await;
        }
        Ok(lock)
    }

    pub async fn release(&self, drawing_id: &str, user_id: &str) -> Result<(), LockError> {
        validate(drawing_id, user_id)?;

        let mut locks = self.locks.write().await;
        match locks.get(drawing_id) {
            None => return Err(LockError::NotLocked(drawing_id.to_string())),
            Some(existing) if existing.user_id != user_id => {
                return Err(LockError::NotHolder {
                    drawing_id: drawing_id.to_string(),
                    locked_by: existing.user_id.clone(),
                });
            }
            Some(_) => {}
        }
        locks.remove(drawing_id);

        info!("Drawing {} unlocked by {}", drawing_id, user_id);
        self.hub
            .publish(drawing_id, ServerMessage::unlocked(drawing_id))
            .await;
        Ok(())
    }

    /// The live lock on `drawing_id`, if any
    pub async fn current(&self, drawing_id: &str) -> Option<DrawingLock> {
        self.current_at(drawing_id, Utc::now()).await
    }

    pub async fn current_at(&self, drawing_id: &str, now: DateTime<Utc>) -> Option<DrawingLock> {
        let locks = self.locks.read().await;
        locks
            .get(drawing_id)
            .filter(|lock| !lock.is_expired_at(now))
            .cloned()
    }

    pub async fn sweep_expired(&self) -> Vec<DrawingLock> {
        self.sweep_expired_at(Utc::now()).await
    }

    /// Remove locks that expired by `now` and announce them as unlocked.
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Vec<DrawingLock> {
        let mut locks = self.locks.write().await;
        let ids: Vec<String> = locks
            .values()
            .filter(|lock| lock.is_expired_at(now))
            .map(|lock| lock.drawing_id.clone())
            .collect();
        let expired: Vec<DrawingLock> = ids.iter().filter_map(|id| locks.remove(id)).collect();

        for lock in &expired {
            info!("Lock on drawing {} held by {} expired", lock.drawing_id, lock.user_id);
            self.hub
                .publish(&lock.drawing_id, ServerMessage::unlocked(&lock.drawing_id))
                .await;
        }
        expired
    }

    pub async fn count(&self) -> usize {
        self.locks.read().await.len()
    }
}

fn validate(drawing_id: &str, user_id: &str) -> Result<(), LockError> {
    if drawing_id.trim().is_empty() {
        return Err(LockError::InvalidArgument("drawing_id must not be empty".to_string()));
    }
    if user_id.trim().is_empty() {
        return Err(LockError::InvalidArgument("user_id must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast;

    fn service() -> (LockService, Arc<LockHub>) {
        let hub = Arc::new(LockHub::new(16));
        (LockService::new(hub.clone(), Duration::from_secs(300)), hub)
    }

    fn drain(rx: &mut broadcast::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            out.push(message);
        }
        out
    }

    #[tokio::test]
    async fn acquire_publishes_locked() {
        let (locks, hub) = service();
        let mut room = hub.join("d").await;

        let lock = locks.acquire("d", "alice").await.unwrap();

        assert_eq!(lock.user_id, "alice");
        assert_eq!(lock.expires_at - lock.acquired_at, chrono::Duration::seconds(300));
        assert_eq!(drain(&mut room), vec![ServerMessage::locked("d", "alice")]);
    }

    #[tokio::test]
    async fn second_user_is_refused_while_lock_is_live() {
        let (locks, _) = service();
        locks.acquire("d", "alice").await.unwrap();

        let err = locks.acquire("d", "bob").await.unwrap_err();

        assert!(matches!(err, LockError::Held { ref locked_by, .. } if locked_by == "alice"));
    }

    #[tokio::test]
    async fn holder_refresh_extends_expiry_silently() {
        let (locks, hub) = service();
        let t0 = Utc::now();
        let first = locks.acquire_at("d", "alice", t0).await.unwrap();
        let mut room = hub.join("d").await;

        let t1 = t0 + chrono::Duration::seconds(100);
        let refreshed = locks.acquire_at("d", "alice", t1).await.unwrap();

        assert_eq!(refreshed.acquired_at, first.acquired_at);
        assert_eq!(refreshed.expires_at, t1 + chrono::Duration::seconds(300));
        assert!(drain(&mut room).is_empty());
    }

    #[tokio::test]
    async fn expired_lock_can_be_taken_over() {
        let (locks, hub) = service();
        let t0 = Utc::now();
        locks.acquire_at("d", "alice", t0).await.unwrap();
        let mut room = hub.join("d").await;

        let later = t0 + chrono::Duration::seconds(301);
        let lock = locks.acquire_at("d", "bob", later).await.unwrap();

        assert_eq!(lock.user_id, "bob");
        assert_eq!(drain(&mut room), vec![ServerMessage::locked("d", "bob")]);
    }

    #[tokio::test]
    async fn release_rules() {
        let (locks, hub) = service();
        assert_eq!(
            locks.release("d", "alice").await,
            Err(LockError::NotLocked("d".to_string()))
        );

        locks.acquire("d", "alice").await.unwrap();
        assert!(matches!(
            locks.release("d", "bob").await,
            Err(LockError::NotHolder { .. })
        ));

        let mut room = hub.join("d").await;
        locks.release("d", "alice").await.unwrap();
        assert_eq!(drain(&mut room), vec![ServerMessage::unlocked("d")]);
        assert!(locks.current("d").await.is_none());
    }

    #[tokio::test]
    async fn sweep_announces_expired_locks() {
        let (locks, hub) = service();
        let t0 = Utc::now();
        locks.acquire_at("old", "alice", t0).await.unwrap();
        locks
            .acquire_at("fresh", "bob", t0 + chrono::Duration::seconds(200))
            .await
            .unwrap();
        let mut old_room = hub.join("old").await;

        let expired = locks
            .sweep_expired_at(t0 + chrono::Duration::seconds(301))
            .await;

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].drawing_id, "old");
        assert_eq!(drain(&mut old_room), vec![ServerMessage::unlocked("old")]);
        assert_eq!(locks.count().await, 1);
    }

    #[tokio::test]
    async fn current_hides_expired_locks() {
        let (locks, _) = service();
        let t0 = Utc::now();
        locks.acquire_at("d", "alice", t0).await.unwrap();

        assert!(locks.current_at("d", t0).await.is_some());
        assert!(locks
            .current_at("d", t0 + chrono::Duration::seconds(300))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn lock_changes_wait_for_their_announcement() {
        let hub = Arc::new(LockHub::new(16));
        let locks = Arc::new(LockService::new(hub.clone(), Duration::from_secs(300)));
        let mut room = hub.join("d").await;
        locks.acquire("d", "alice").await.unwrap();

        let rooms = hub.hold_rooms().await;
        let release = tokio::spawn({
            let locks = locks.clone();
            async move { locks.release("d", "alice").await }
        });
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        // The release is stuck announcing; nobody may slip in behind it.
        assert!(tokio::time::timeout(Duration::from_millis(50), locks.acquire("d", "bob"))
            .await
            .is_err());

        drop(rooms);
        release.await.unwrap().unwrap();
        locks.acquire("d", "bob").await.unwrap();

        assert_eq!(
            drain(&mut room),
            vec![
                ServerMessage::locked("d", "alice"),
                ServerMessage::unlocked("d"),
                ServerMessage::locked("d", "bob"),
            ]
        );
    }

    #[tokio::test]
    async fn empty_ids_are_rejected() {
        let (locks, _) = service();
        assert!(matches!(
            locks.acquire("", "alice").await,
            Err(LockError::InvalidArgument(_))
        ));
        assert!(matches!(
            locks.release("d", " ").await,
            Err(LockError::InvalidArgument(_))
        ));
    }
}
