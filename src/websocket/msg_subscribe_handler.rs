use tracing::{info, warn};

use crate::models::ServerMessage;
use crate::state::AppState;
use crate::ws::ConnectionSubscriptions;

/// Handle `subscribe_drawing`.
///
/// A fresh subscriber is told about a lock that is already held, so it does
/// not have to wait for the next change.
pub async fn handle_subscribe_message(
    state: &AppState,
    connection_id: &str,
    subscriptions: &mut ConnectionSubscriptions,
    drawing_id: &str,
) {
    if drawing_id.trim().is_empty() {
        warn!("Connection {} sent subscribe_drawing without a drawing id", connection_id);
        subscriptions.send(ServerMessage::error("drawing_id must not be empty"));
        return;
    }

    if !subscriptions.subscribe(&state.hub, drawing_id).await {
        return;
    }
    info!("Connection {} subscribed to drawing {}", connection_id, drawing_id);

    if let Some(lock) = state.locks.current(drawing_id).await {
        subscriptions.send(ServerMessage::locked(lock.drawing_id, lock.user_id));
    }
}

/// Handle `unsubscribe_drawing`
pub fn handle_unsubscribe_message(
    connection_id: &str,
    subscriptions: &mut ConnectionSubscriptions,
    drawing_id: &str,
) {
    if subscriptions.unsubscribe(drawing_id) {
        info!("Connection {} unsubscribed from drawing {}", connection_id, drawing_id);
    }
}
