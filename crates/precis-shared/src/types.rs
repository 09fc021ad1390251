use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{PREVIEW_MAX_CHARS, TEMP_ID_PREFIX};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message identifier: either server-assigned, or a temporary token
/// (`temp-<role>-<uuid>`) minted locally before the backend confirms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn temporary(role: Role) -> Self {
        Self(format!("{TEMP_ID_PREFIX}{role}-{}", Uuid::new_v4()))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A chat message as held by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    /// Server creation time; `None` while the message is temporary.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Build an unconfirmed local message.
    pub fn temporary(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::temporary(role),
            role,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn is_temporary(&self) -> bool {
        self.id.is_temporary()
    }
}

/// One past conversation as listed in the history sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    /// First user message, trimmed and truncated. Derived client-side.
    pub preview: Option<String>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: None,
            preview: None,
        }
    }
}

/// Authenticated user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub username: String,
    pub email: String,
}

/// Result of the stand-alone summarize endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    pub original_length: usize,
    pub summary_length: usize,
}

/// Derive a sidebar preview from a message body: trimmed, then cut to
/// [`PREVIEW_MAX_CHARS`] characters. Blank content has no preview.
pub fn preview_text(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(PREVIEW_MAX_CHARS).collect())
}

/// Preview of a conversation given (a window of) its messages.
pub fn preview_for(messages: &[Message]) -> Option<String> {
    messages
        .iter()
        .find(|m| m.role == Role::User)
        .and_then(|m| preview_text(&m.content))
}
