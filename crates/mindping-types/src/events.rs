use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Message, MessageKind};

/// Longest `content` accepted on a send, counted in characters.
pub const MAX_CONTENT_CHARS: usize = 100;

/// Frames sent FROM client TO server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Bind this channel to a user id
    Authenticate {
        #[serde(rename = "userId")]
        user_id: i64,
    },

    /// Send an emoticon or thought. The payload stays untyped until the
    /// session is authenticated, so pre-auth sends can be dropped without
    /// being validated.
    Message {
        #[serde(default)]
        payload: serde_json::Value,
    },
}

/// Frames sent FROM server TO client over the WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Confirmation to the sender, carrying the stored message
    MessageSent { message: Message },

    /// Live delivery to the recipient
    NewMessage { message: Message },

    /// Current unseen count for the channel's user
    Notifications { count: u64 },

    /// Human-readable failure; the channel stays open
    Error { message: String },
}

impl ServerFrame {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("Invalid message payload: {0}")]
    Malformed(String),

    #[error("Invalid message payload: content must not be empty")]
    EmptyContent,

    #[error("Invalid message payload: content must be at most {max} characters (got {len})", max = MAX_CONTENT_CHARS)]
    ContentTooLong { len: usize },
}

/// Body of a `message` frame once it has been typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPayload {
    pub recipient_id: i64,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
}

impl SendPayload {
    /// Type and validate a raw `message` payload.
    pub fn from_value(value: serde_json::Value) -> Result<Self, PayloadError> {
        let payload: SendPayload =
            serde_json::from_value(value).map_err(|e| PayloadError::Malformed(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.content.is_empty() {
            return Err(PayloadError::EmptyContent);
        }
        let len = self.content.chars().count();
        if len > MAX_CONTENT_CHARS {
            return Err(PayloadError::ContentTooLong { len });
        }
        Ok(())
    }
}
