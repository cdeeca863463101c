use std::collections::HashMap;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use super::hub::LockHub;
use crate::models::ServerMessage;

/// Drawing rooms one client connection listens to.
///
/// Each subscription is a task forwarding the room's broadcasts into the
/// connection's outbound queue. A connection is in a room at most once, no
/// matter how often the client asks.
pub struct ConnectionSubscriptions {
    outbound: mpsc::UnboundedSender<ServerMessage>,
    forwarders: HashMap<String, JoinHandle<()>>,
}

impl ConnectionSubscriptions {
    pub fn new(outbound: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            outbound,
            forwarders: HashMap::new(),
        }
    }

    /// Join the drawing's room. Returns false when already subscribed.
    pub async fn subscribe(&mut self, hub: &LockHub, drawing_id: &str) -> bool {
        if self.forwarders.contains_key(drawing_id) {
            return false;
        }

        let mut room = hub.join(drawing_id).await;
        let outbound = self.outbound.clone();
        let room_id = drawing_id.to_string();
        let forwarder = tokio::spawn(async move {
            loop {
                match room.recv().await {
                    Ok(message) => {
                        if outbound.send(message).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Connection lagged {} lock events on drawing {}", skipped, room_id);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        self.forwarders.insert(drawing_id.to_string(), forwarder);
        true
    }

    /// Leave the drawing's room. Returns false when not subscribed.
    pub fn unsubscribe(&mut self, drawing_id: &str) -> bool {
        match self.forwarders.remove(drawing_id) {
            Some(forwarder) => {
                forwarder.abort();
                true
            }
            None => false,
        }
    }

    /// Push a frame to this connection only
    /// Leave every room
    pub fn clear(&mut self) {
        for (_, forwarder) in self.forwarders.drain() {
            forwarder.abort();
        }
    }

    pub fn send(&self, message: ServerMessage) {
        let _ = self.outbound.send(message);
    }
}

impl Drop for ConnectionSubscriptions {
    fn drop(&mut self) {
        self.clear();
    }
}
