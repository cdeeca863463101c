use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::models::ServerMessage;

/// Per-drawing broadcast rooms for lock events.
///
/// A room is created the first time a connection joins it and pruned once
/// its last receiver is gone.
pub struct LockHub {
    rooms: RwLock<HashMap<String, broadcast::Sender<ServerMessage>>>,
    capacity: usize,
}

impl LockHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn join(&self, drawing_id: &str) -> broadcast::Receiver<ServerMessage> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(drawing_id.to_string())
            .or_insert_with(|| {
                debug!("Opening room for drawing {}", drawing_id);
                broadcast::channel(self.capacity).0
            })
            .subscribe()
    }

    /// Send `message` to every connection in the drawing's room.
    /// Returns how many receivers it reached.
    pub async fn publish(&self, drawing_id: &str, message: ServerMessage) -> usize {
        let rooms = self.rooms.read().await;
        match rooms.get(drawing_id) {
            Some(room) => room.send(message).unwrap_or(0),
            None => 0,
        }
    }

    /// Drop rooms nobody listens to anymore
    pub async fn prune(&self) -> usize {
        let mut rooms = self.rooms.write().await;
        let before = rooms.len();
        rooms.retain(|_, room| room.receiver_count() > 0);
        before - rooms.len()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn subscriber_count(&self, drawing_id: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(drawing_id).map_or(0, |room| room.receiver_count())
    }

    /// Block publishing until the guard is dropped
    #[cfg(test)]
    pub(crate) async fn hold_rooms(
        &self,
    ) -> tokio::sync::RwLockWriteGuard<'_, HashMap<String, broadcast::Sender<ServerMessage>>> {
        self.rooms.write().await
    }

    pub async fn total_subscriptions(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.values().map(|room| room.receiver_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_only_the_drawing_room() {
        let hub = LockHub::new(8);
        let mut a = hub.join("a").await;
        let mut b = hub.join("b").await;

        assert_eq!(hub.publish("a", ServerMessage::locked("a", "alice")).await, 1);

        assert_eq!(a.recv().await.unwrap(), ServerMessage::locked("a", "alice"));
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_to_unknown_room_reaches_nobody() {
        let hub = LockHub::new(8);
        assert_eq!(hub.publish("ghost", ServerMessage::unlocked("ghost")).await, 0);
        assert_eq!(hub.room_count().await, 0);
    }

    #[tokio::test]
    async fn prune_removes_rooms_without_receivers() {
        let hub = LockHub::new(8);
        let kept = hub.join("kept").await;
        drop(hub.join("gone").await);

        assert_eq!(hub.prune().await, 1);
        assert_eq!(hub.room_count().await, 1);
        assert_eq!(hub.subscriber_count("kept").await, 1);
        drop(kept);
    }
}
