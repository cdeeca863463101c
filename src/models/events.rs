use serde::{Deserialize, Serialize};

use super::messages::{ServerError, ServerMessage};

/// Lock notification handed to drawing subscribers
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DrawingLockEvent {
    Locked { drawing_id: String, locked_by: String },
    Unlocked { drawing_id: String },
}

impl DrawingLockEvent {
    pub fn drawing_id(&self) -> &str {
        match self {
            DrawingLockEvent::Locked { drawing_id, .. } => drawing_id,
            DrawingLockEvent::Unlocked { drawing_id } => drawing_id,
        }
    }
}

/// Only lock and unlock frames become events; `error` frames are handed back.
impl TryFrom<ServerMessage> for DrawingLockEvent {
    type Error = ServerError;

    fn try_from(message: ServerMessage) -> Result<Self, Self::Error> {
        match message {
            ServerMessage::DrawingLocked(msg) => Ok(DrawingLockEvent::Locked {
                drawing_id: msg.drawing_id,
                locked_by: msg.locked_by,
            }),
            ServerMessage::DrawingUnlocked(msg) => Ok(DrawingLockEvent::Unlocked {
                drawing_id: msg.drawing_id,
            }),
            ServerMessage::Error(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn locked_event_serializes_with_type_tag() {
        let event = DrawingLockEvent::try_from(ServerMessage::locked("drawing-42", "alice")).unwrap();
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "locked", "drawing_id": "drawing-42", "locked_by": "alice" })
        );
    }

    #[test]
    fn error_frames_do_not_become_events() {
        let result = DrawingLockEvent::try_from(ServerMessage::error("boom"));
        assert_eq!(result, Err(ServerError::message("boom")));
    }
}
