//! Visitor session and its persisted snapshot.

use crate::ids::SessionId;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Registration answers keyed by field name, in the order they were given.
pub type UserData = IndexMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::System,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The persisted, per-browser record of one visitor.
///
/// Serialized as `{userData, isRegistered, messages, sessionId, lastActive}`
/// with `lastActive` in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSession {
    #[serde(default)]
    pub user_data: UserData,
    #[serde(default)]
    pub is_registered: bool,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_active: DateTime<Utc>,
}

impl Default for WidgetSession {
    fn default() -> Self {
        Self {
            user_data: UserData::new(),
            is_registered: false,
            messages: Vec::new(),
            session_id: None,
            last_active: Utc::now(),
        }
    }
}

impl WidgetSession {
    /// Return the session id, generating it on first use.
    pub fn ensure_session_id(&mut self) -> &SessionId {
        self.session_id.get_or_insert_with(SessionId::new_uuid)
    }

    /// True when more than `timeout_minutes` have passed since `last_active`.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout_minutes: u64) -> bool {
        let timeout = i64::try_from(timeout_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .unwrap_or(Duration::MAX);
        now.signed_duration_since(self.last_active) > timeout
    }

    /// Drop the oldest messages so at most `limit` remain.
    pub fn rotate_history(&mut self, limit: usize) -> usize {
        let excess = self.messages.len().saturating_sub(limit);
        if excess > 0 {
            self.messages.drain(..excess);
        }
        excess
    }

    /// Fields compared by a save/load round-trip (everything but `last_active`).
    pub fn same_contents(&self, other: &Self) -> bool {
        self.user_data == other.user_data
            && self.is_registered == other.is_registered
            && self.session_id == other.session_id
            && self.messages == other.messages
    }
}
