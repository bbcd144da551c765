//! Events the widget emits to the host page and posts to analytics.
//!
//! [`WidgetEvent`] mirrors the custom element's DOM events: `message-sent`
//! and `response-received`, both bubbling and composed so host listeners
//! outside the shadow root receive them. [`AnalyticsEvent`] is the body
//! posted to `<apiEndpoint>/analytics`.

use crate::ids::SessionId;
use crate::session::UserData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Payload carried in a widget event's `detail`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetail {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "kebab-case")]
pub enum WidgetEvent {
    MessageSent(EventDetail),
    ResponseReceived(EventDetail),
}

impl WidgetEvent {
    pub fn message_sent(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::MessageSent(EventDetail {
            message: message.into(),
            timestamp,
        })
    }

    pub fn response_received(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::ResponseReceived(EventDetail {
            message: message.into(),
            timestamp,
        })
    }

    /// DOM event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageSent(_) => "message-sent",
            Self::ResponseReceived(_) => "response-received",
        }
    }

    pub fn detail(&self) -> &EventDetail {
        match self {
            Self::MessageSent(detail) | Self::ResponseReceived(detail) => detail,
        }
    }

    pub fn bubbles(&self) -> bool {
        true
    }

    pub fn composed(&self) -> bool {
        true
    }
}

/// Analytics events the runtime tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsEventName {
    WidgetOpened,
    WidgetClosed,
    UserRegistered,
    MessageSent,
    ResponseReceived,
}

impl AnalyticsEventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WidgetOpened => "widget_opened",
            Self::WidgetClosed => "widget_closed",
            Self::UserRegistered => "user_registered",
            Self::MessageSent => "message_sent",
            Self::ResponseReceived => "response_received",
        }
    }
}

impl fmt::Display for AnalyticsEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST <apiEndpoint>/analytics`.
///
/// Extra fields are flattened into the top-level object, matching the
/// `{event, timestamp, sessionId, userData, url, ...data}` layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<SessionId>,
    pub user_data: UserData,
    pub url: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl AnalyticsEvent {
    pub fn new(
        event: AnalyticsEventName,
        session_id: Option<SessionId>,
        user_data: UserData,
        url: impl Into<String>,
    ) -> Self {
        Self {
            event: event.as_str().to_owned(),
            timestamp: Utc::now(),
            session_id,
            user_data,
            url: url.into(),
            data: Map::new(),
        }
    }

    /// Attach extra fields. Keys colliding with the fixed fields are dropped.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        const RESERVED: [&str; 5] = ["event", "timestamp", "sessionId", "userData", "url"];
        self.data.extend(
            data.into_iter()
                .filter(|(key, _)| !RESERVED.contains(&key.as_str())),
        );
        self
    }
}
