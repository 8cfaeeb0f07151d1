use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user as exposed to clients. The password hash never leaves
/// the store layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub avatar: String,
}

/// The two kinds of thing a user can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Emoticon,
    Thought,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emoticon => "emoticon",
            Self::Thought => "thought",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "emoticon" => Ok(Self::Emoticon),
            "thought" => Ok(Self::Thought),
            other => Err(format!("unknown message type '{}'", other)),
        }
    }
}

/// A delivered emoticon or thought. Only `seen` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub seen: bool,
    pub created_at: DateTime<Utc>,
}
