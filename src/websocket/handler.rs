use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::utils::scope_guard::ScopeGuard;
use crate::websocket::msg_subscribe_handler::{handle_subscribe_message, handle_unsubscribe_message};
use crate::ws::ConnectionSubscriptions;

/// WebSocket handler
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    debug!("New WebSocket connection attempt");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Route one client frame, whichever transport it came in on.
pub async fn handle_client_message(
    state: &AppState,
    connection_id: &str,
    subscriptions: &mut ConnectionSubscriptions,
    message: ClientMessage,
) {
    match message {
        ClientMessage::SubscribeDrawing(msg) => {
            handle_subscribe_message(state, connection_id, subscriptions, &msg.drawing_id).await;
        }
        ClientMessage::UnsubscribeDrawing(msg) => {
            handle_unsubscribe_message(connection_id, subscriptions, &msg.drawing_id);
        }
    }
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4().to_string();

    state.ws_connections.fetch_add(1, Ordering::SeqCst);
    let _connection_count = {
        let state = state.clone();
        ScopeGuard::new(move || {
            state.ws_connections.fetch_sub(1, Ordering::SeqCst);
        })
    };

    info!("WebSocket connection {} established", connection_id);
    let (mut sender, mut receiver) = socket.split();

    // Everything for this client goes through one queue: room broadcasts,
    // lock snapshots and error replies.
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let mut subscriptions = ConnectionSubscriptions::new(outbound_tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => {
                        debug!("Connection {} sent {:?}", recv_id, message);
                        handle_client_message(&recv_state, &recv_id, &mut subscriptions, message).await;
                    }
                    Err(e) => {
                        warn!("Failed to parse frame from connection {}: {}", recv_id, e);
                        subscriptions.send(ServerMessage::error(format!("Malformed frame: {}", e)));
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };
    info!("WebSocket connection {} terminated", connection_id);
}
