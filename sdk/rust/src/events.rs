//! Inbound event taxonomy.
//!
//! Frames from the chat backend are JSON objects discriminated by `type`.
//! Chat messages predate the discriminator: a frame with an `id` and no
//! `type` is a chat message.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FrameError;

/// Message identifier; the backend sends either strings or integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageId {
    Text(String),
    Number(i64),
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageId::Text(id) => f.write_str(id),
            MessageId::Number(id) => write!(f, "{}", id),
        }
    }
}

/// A chat message. Everything besides `id` is kept as received.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub id: MessageId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ChatMessage {
    /// Message body, under `message` or `text`.
    pub fn text(&self) -> Option<&str> {
        self.fields
            .get("message")
            .or_else(|| self.fields.get("text"))
            .and_then(Value::as_str)
    }
}

/// Reaction counts changed on a message.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReactionUpdate {
    #[serde(default)]
    pub message_id: Option<MessageId>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    ChatMessage(ChatMessage),
    Reaction(ReactionUpdate),
    MessageDeleted { message_id: MessageId },
    UserBlocked { message: String },
    Kicked { message: String },
    /// The backend reported an error instead of an event.
    ProtocolError { error: Value },
}

#[derive(Deserialize)]
struct MessageDeletedFrame {
    message_id: MessageId,
}

#[derive(Deserialize)]
struct NoticeFrame {
    message: String,
}

/// Parse and classify one text frame.
pub fn parse_frame(text: &str) -> Result<InboundEvent, FrameError> {
    let mut map = match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => map,
        _ => return Err(FrameError::NotAnObject),
    };

    if let Some(error) = map.get("error") {
        return Ok(InboundEvent::ProtocolError {
            error: error.clone(),
        });
    }

    let kind = match map.remove("type") {
        Some(Value::String(kind)) => kind,
        Some(_) => return Err(FrameError::InvalidType),
        None if map.contains_key("id") => {
            let message = serde_json::from_value(Value::Object(map))?;
            return Ok(InboundEvent::ChatMessage(message));
        }
        None => return Err(FrameError::Unclassified),
    };

    let body = Value::Object(map);
    match kind.as_str() {
        "reaction" => Ok(InboundEvent::Reaction(serde_json::from_value(body)?)),
        "message_deleted" => {
            let frame: MessageDeletedFrame = serde_json::from_value(body)?;
            Ok(InboundEvent::MessageDeleted {
                message_id: frame.message_id,
            })
        }
        "user_blocked" => {
            let frame: NoticeFrame = serde_json::from_value(body)?;
            Ok(InboundEvent::UserBlocked {
                message: frame.message,
            })
        }
        "kicked" => {
            let frame: NoticeFrame = serde_json::from_value(body)?;
            Ok(InboundEvent::Kicked {
                message: frame.message,
            })
        }
        _ => Err(FrameError::UnknownType(kind)),
    }
}
