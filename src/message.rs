use std::fmt;

use gateway_api::HistoryMessage;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

/// Opaque chat session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh client-side id for a chat that has not been sent yet.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One chat turn as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Set only on the assistant message a live stream is writing into.
    pub is_loading: bool,
    pub timestamp: Option<OffsetDateTime>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            is_loading: false,
            timestamp: Some(OffsetDateTime::now_utc()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.into(),
            is_loading: false,
            timestamp: Some(OffsetDateTime::now_utc()),
        }
    }

    /// Empty, loading assistant message a new stream writes into.
    pub fn assistant_placeholder() -> Self {
        Self {
            is_loading: true,
            ..Self::assistant(String::new())
        }
    }

    /// Convert a stored turn. Roles other than user and assistant are dropped.
    pub fn from_history(entry: &HistoryMessage) -> Option<Self> {
        let role = match entry.role.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            other => {
                tracing::debug!(role = other, "skipping history entry");
                return None;
            }
        };

        Some(Self {
            id: entry
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            role,
            content: entry.content.clone(),
            is_loading: false,
            timestamp: entry
                .created_at
                .as_deref()
                .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok()),
        })
    }

    pub fn is_live(&self) -> bool {
        self.role == Role::Assistant && self.is_loading
    }
}

pub fn messages_from_history(entries: &[HistoryMessage]) -> Vec<Message> {
    entries.iter().filter_map(Message::from_history).collect()
}
