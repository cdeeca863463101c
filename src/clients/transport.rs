use std::fmt;
use std::str::FromStr;

use tokio::sync::mpsc;

use crate::models::{ClientMessage, ServerMessage};

/// Wire transports a connection can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Full duplex WebSocket
    WebSocket,
    /// HTTP long-polling
    Polling,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::WebSocket => write!(f, "websocket"),
            TransportKind::Polling => write!(f, "polling"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(TransportKind::WebSocket),
            "polling" | "long-polling" => Ok(TransportKind::Polling),
            other => Err(TransportError::UnknownTransport(other.to_string())),
        }
    }
}

/// Connection state as seen by the notifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Signals a connection sends back to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A session is up. `reconnect` is true for every session after the first.
    Connected { kind: TransportKind, reconnect: bool },
    /// An established session ended
    Disconnected { reason: String },
    /// A connection attempt failed on every configured transport
    ConnectError { error: String },
    /// Reconnection attempts are exhausted; the connection stays down
    ReconnectFailed,
    /// Inbound frame from the server
    Message(ServerMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Unknown transport: {0}")]
    UnknownTransport(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Connection timed out")]
    Timeout,
    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

/// Opens connections to the relay.
///
/// The notifier owns one connector for its whole lifetime and asks it for a
/// fresh [`Connection`] whenever it needs to (re)connect.
pub trait Connector: Send + Sync + 'static {
    /// Start connecting in the background. Lifecycle changes and inbound
    /// frames are reported on `events` until the connection is closed.
    fn open(&self, events: mpsc::UnboundedSender<TransportEvent>) -> Box<dyn Connection>;
}

/// Handle to one live (or still connecting) connection
pub trait Connection: Send + Sync {
    fn state(&self) -> ConnectionState;

    /// Queue a frame. Frames queued before the session is up are flushed
    /// once it is.
    fn emit(&self, message: ClientMessage);

    /// Tear the connection down, abandoning any reconnection in progress.
    /// A live session is closed cleanly when the server can be reached.
    fn close(self: Box<Self>);
}
