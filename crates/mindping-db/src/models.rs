//! Database row types — these map directly to SQLite rows.
//! Distinct from mindping-types models to keep the DB layer independent.

use chrono::{DateTime, Utc};
use tracing::warn;

use mindping_types::models::{Message, MessageKind, User};

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub avatar: String,
}

impl UserRow {
    /// Drop the credential and keep what clients may see.
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            avatar: self.avatar,
        }
    }
}

pub struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub kind: String,
    pub content: String,
    pub seen: bool,
    pub created_at: String,
}

impl MessageRow {
    pub fn into_message(self) -> Message {
        let kind = self.kind.parse::<MessageKind>().unwrap_or_else(|e| {
            warn!("Corrupt kind on message {}: {}", self.id, e);
            MessageKind::Thought
        });
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|e| {
                warn!("Corrupt created_at '{}' on message {}: {}", self.created_at, self.id, e);
                DateTime::default()
            });

        Message {
            id: self.id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            kind,
            content: self.content,
            seen: self.seen,
            created_at,
        }
    }
}
