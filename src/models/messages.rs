use serde::{Deserialize, Serialize};

/// Payload naming a single drawing
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DrawingRef {
    pub drawing_id: String,
}

impl DrawingRef {
    pub fn new(drawing_id: impl Into<String>) -> Self {
        Self { drawing_id: drawing_id.into() }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DrawingLockedMessage {
    pub drawing_id: String,
    pub locked_by: String,
}

/// Diagnostic payload of an `error` frame.
///
/// Servers are free to send anything here. A `{ "message": .. }` object is
/// recognised, everything else is kept as an opaque JSON value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ServerError {
    Message { message: String },
    Unknown(serde_json::Value),
}

impl ServerError {
    pub fn message(message: impl Into<String>) -> Self {
        ServerError::Message { message: message.into() }
    }
}

/// Frames sent from a client to the relay
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "subscribe_drawing")]
    SubscribeDrawing(DrawingRef),
    #[serde(rename = "unsubscribe_drawing")]
    UnsubscribeDrawing(DrawingRef),
}

/// Frames pushed from the relay to a client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "drawing_locked")]
    DrawingLocked(DrawingLockedMessage),
    #[serde(rename = "drawing_unlocked")]
    DrawingUnlocked(DrawingRef),
    #[serde(rename = "error")]
    Error(ServerError),
}

impl ServerMessage {
    pub fn locked(drawing_id: impl Into<String>, locked_by: impl Into<String>) -> Self {
        ServerMessage::DrawingLocked(DrawingLockedMessage {
            drawing_id: drawing_id.into(),
            locked_by: locked_by.into(),
        })
    }

    pub fn unlocked(drawing_id: impl Into<String>) -> Self {
        ServerMessage::DrawingUnlocked(DrawingRef::new(drawing_id))
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError::message(message))
    }
}
