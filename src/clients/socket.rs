//! Reconnecting client connection to the lock relay.
//!
//! Each attempt walks the configured transports in order (WebSocket first,
//! HTTP long-polling as fallback) and keeps the first one that comes up.
//! Outbound frames wait in the connection's queue while no session is up.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::transport::{
    Connection, ConnectionState, Connector, TransportError, TransportEvent, TransportKind,
};
use crate::config::NotifierConfig;
use crate::models::{ClientMessage, PollOpenResponse, ServerMessage};
use crate::utils::scope_guard::ScopeGuard;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`Connector`] speaking to a real relay server
pub struct SocketConnector {
    config: NotifierConfig,
    http: reqwest::Client,
}

impl SocketConnector {
    pub fn new(config: NotifierConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.poll_request_timeout())
            .build()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }
}

impl Connector for SocketConnector {
    fn open(&self, events: mpsc::UnboundedSender<TransportEvent>) -> Box<dyn Connection> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let state = Arc::new(state_tx);

        let task = tokio::spawn(run_connection(
            self.config.clone(),
            self.http.clone(),
            outbound_rx,
            state.clone(),
            events,
        ));

        Box::new(SocketConnection {
            outbound: Some(outbound_tx),
            state,
            task: Some(task),
        })
    }
}

/// Upper bound for a clean goodbye before the connection task is aborted
const CLOSE_GRACE: Duration = Duration::from_secs(2);

struct SocketConnection {
    outbound: Option<mpsc::UnboundedSender<ClientMessage>>,
    state: Arc<watch::Sender<ConnectionState>>,
    task: Option<JoinHandle<()>>,
}

impl SocketConnection {
    /// Dropping the outbound sender ends the session loop, which then sends a
    /// WebSocket close frame or deletes the polling session.
    fn shutdown(&mut self) {
        self.outbound.take();
        let Some(mut task) = self.task.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
                        debug!("Connection task did not stop in time, aborting");
                        task.abort();
                    }
                });
            }
            Err(_) => task.abort(),
        }
    }
}

impl Connection for SocketConnection {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn emit(&self, message: ClientMessage) {
        let sent = self
            .outbound
            .as_ref()
            .is_some_and(|outbound| outbound.send(message).is_ok());
        if !sent {
            debug!("Connection task has stopped, dropping outbound frame");
        }
    }

    fn close(mut self: Box<Self>) {
        self.shutdown();
        self.state.send_replace(ConnectionState::Disconnected);
    }
}

impl Drop for SocketConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// How a session ended
enum SessionEnd {
    /// The owning connection went away
    Closed,
    /// Transport failure or server hang-up
    Lost(String),
}

enum Session {
    WebSocket(Box<WsStream>),
    Polling(PollingSession),
}

impl Session {
    fn kind(&self) -> TransportKind {
        match self {
            Session::WebSocket(_) => TransportKind::WebSocket,
            Session::Polling(_) => TransportKind::Polling,
        }
    }

    async fn run(
        self,
        outbound: &mut mpsc::UnboundedReceiver<ClientMessage>,
        events: &mpsc::UnboundedSender<TransportEvent>,
    ) -> SessionEnd {
        match self {
            Session::WebSocket(stream) => run_websocket(*stream, outbound, events).await,
            Session::Polling(session) => session.run(outbound, events).await,
        }
    }
}

async fn run_connection(
    config: NotifierConfig,
    http: reqwest::Client,
    mut outbound: mpsc::UnboundedReceiver<ClientMessage>,
    state: Arc<watch::Sender<ConnectionState>>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let order = config.transport_order();
    let mut attempts: u32 = 0;
    let mut sessions: u32 = 0;

    loop {
        if events.is_closed() {
            debug!("Connection owner is gone, stopping");
            return;
        }

        state.send_replace(ConnectionState::Connecting);
        match establish(&config, &http, &order).await {
            Ok(session) => {
                let kind = session.kind();
                info!("Connected to {} over {}", config.server_url, kind);
                attempts = 0;
                state.send_replace(ConnectionState::Connected);
                let _ = events.send(TransportEvent::Connected {
                    kind,
                    reconnect: sessions > 0,
                });
                sessions += 1;

                match session.run(&mut outbound, &events).await {
                    SessionEnd::Closed => {
                        state.send_replace(ConnectionState::Disconnected);
                        debug!("Connection closed by its owner");
                        return;
                    }
                    SessionEnd::Lost(reason) => {
                        info!("Connection to {} lost: {}", config.server_url, reason);
                        state.send_replace(ConnectionState::Disconnected);
                        let _ = events.send(TransportEvent::Disconnected { reason });
                    }
                }
            }
            Err(e) => {
                warn!("Connection attempt to {} failed: {}", config.server_url, e);
                let _ = events.send(TransportEvent::ConnectError {
                    error: e.to_string(),
                });
            }
        }

        if !config.reconnection || attempts >= config.reconnection_attempts {
            warn!(
                "Giving up on {} after {} reconnection attempts",
                config.server_url, attempts
            );
            state.send_replace(ConnectionState::Disconnected);
            let _ = events.send(TransportEvent::ReconnectFailed);
            return;
        }

        attempts += 1;
        state.send_replace(ConnectionState::Connecting);
        debug!(
            "Reconnecting in {:?} (attempt {}/{})",
            config.reconnection_delay(),
            attempts,
            config.reconnection_attempts
        );
        tokio::time::sleep(config.reconnection_delay()).await;
    }
}

async fn establish(
    config: &NotifierConfig,
    http: &reqwest::Client,
    order: &[TransportKind],
) -> Result<Session, TransportError> {
    let mut last_error = TransportError::ConnectionFailed("no transport configured".to_string());

    for kind in order {
        let attempt = match kind {
            TransportKind::WebSocket => open_websocket(config)
                .await
                .map(|stream| Session::WebSocket(Box::new(stream))),
            TransportKind::Polling => open_polling(config, http).await.map(Session::Polling),
        };
        match attempt {
            Ok(session) => return Ok(session),
            Err(e) => {
                debug!("{} transport unavailable: {}", kind, e);
                last_error = e;
            }
        }
    }

    Err(last_error)
}

async fn open_websocket(config: &NotifierConfig) -> Result<WsStream, TransportError> {
    let url = config.websocket_url();
    match tokio::time::timeout(config.connect_timeout(), connect_async(url.as_str())).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(TransportError::ConnectionFailed(e.to_string())),
        Err(_) => Err(TransportError::Timeout),
    }
}

async fn run_websocket(
    stream: WsStream,
    outbound: &mut mpsc::UnboundedReceiver<ClientMessage>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            outgoing = outbound.recv() => match outgoing {
                Some(message) => {
                    let text = match serde_json::to_string(&message) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode outbound frame: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        return SessionEnd::Lost(e.to_string());
                    }
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Closed;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(message) = decode_frame(&text) {
                        let _ = events.send(TransportEvent::Message(message));
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return SessionEnd::Lost("server closed the connection".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
            },
        }
    }
}

struct PollingSession {
    http: reqwest::Client,
    url: String,
}

async fn open_polling(
    config: &NotifierConfig,
    http: &reqwest::Client,
) -> Result<PollingSession, TransportError> {
    let response = http
        .post(config.polling_url())
        .timeout(config.connect_timeout())
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

    let opened: PollOpenResponse = response
        .json()
        .await
        .map_err(|e| TransportError::ProtocolError(e.to_string()))?;

    Ok(PollingSession {
        http: http.clone(),
        url: format!("{}/{}", config.polling_url(), opened.sid),
    })
}

impl PollingSession {
    async fn run(
        self,
        outbound: &mut mpsc::UnboundedReceiver<ClientMessage>,
        events: &mpsc::UnboundedSender<TransportEvent>,
    ) -> SessionEnd {
        // The long-poll runs on its own task so an outbound frame never
        // cancels a poll that already drained frames on the server.
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
        let poller = tokio::spawn(poll_loop(self.http.clone(), self.url.clone(), inbound_tx));
        let _poller_guard = ScopeGuard::new(move || poller.abort());

        loop {
            tokio::select! {
                outgoing = outbound.recv() => match outgoing {
                    Some(message) => {
                        let sent = self
                            .http
                            .post(&self.url)
                            .json(&message)
                            .send()
                            .await
                            .and_then(|response| response.error_for_status());
                        if let Err(e) = sent {
                            return SessionEnd::Lost(e.to_string());
                        }
                    }
                    None => {
                        let _ = self.http.delete(&self.url).send().await;
                        return SessionEnd::Closed;
                    }
                },
                batch = inbound_rx.recv() => match batch {
                    Some(Ok(frames)) => {
                        for frame in frames {
                            match serde_json::from_value::<ServerMessage>(frame) {
                                Ok(message) => {
                                    let _ = events.send(TransportEvent::Message(message));
                                }
                                Err(e) => warn!("Dropping malformed frame: {}", e),
                            }
                        }
                    }
                    Some(Err(reason)) => return SessionEnd::Lost(reason),
                    None => return SessionEnd::Lost("poller stopped".to_string()),
                },
            }
        }
    }
}

async fn poll_loop(
    http: reqwest::Client,
    url: String,
    inbound: mpsc::UnboundedSender<Result<Vec<serde_json::Value>, String>>,
) {
    loop {
        let batch = match http
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
        {
            Ok(response) => response
                .json::<Vec<serde_json::Value>>()
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let failed = batch.is_err();
        if inbound.send(batch).is_err() || failed {
            return;
        }
    }
}

/// Decode one inbound text frame, logging and dropping anything malformed.
fn decode_frame(text: &str) -> Option<ServerMessage> {
    match serde_json::from_str(text) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!("Dropping malformed frame: {}", e);
            None
        }
    }
}
