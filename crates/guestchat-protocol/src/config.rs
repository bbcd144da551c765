//! Widget configuration supplied by the host page at embed time.
//!
//! The serialized form is the host's global configuration object: camelCase
//! keys, every key optional, missing keys falling back to the built-in
//! defaults.

use crate::error::{WidgetError, WidgetResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Corner of the host viewport the floating affordance is anchored to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BottomRight => "bottom-right",
            Self::BottomLeft => "bottom-left",
            Self::TopRight => "top-right",
            Self::TopLeft => "top-left",
        }
    }
}

impl FromStr for Position {
    type Err = WidgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "bottom-right" => Ok(Self::BottomRight),
            "bottom-left" => Ok(Self::BottomLeft),
            "top-right" => Ok(Self::TopRight),
            "top-left" => Ok(Self::TopLeft),
            other => Err(WidgetError::InvalidConfig(format!(
                "unknown position: {other}"
            ))),
        }
    }
}

/// A field the visitor must fill in before chatting is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationField {
    Name,
    Phone,
    Email,
}

impl RegistrationField {
    /// Key used in `userData` and in the registration form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Phone => "phone",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for RegistrationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationField {
    type Err = WidgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "phone" => Ok(Self::Phone),
            "email" => Ok(Self::Email),
            other => Err(WidgetError::InvalidConfig(format!(
                "unknown registration field: {other}"
            ))),
        }
    }
}

/// Immutable configuration of one embedded widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WidgetConfiguration {
    pub position: Position,
    #[serde(rename = "primaryColor")]
    pub color: String,
    pub title: String,
    pub placeholder: String,
    pub welcome_message: String,
    pub offline_message: String,
    pub auto_open: bool,
    pub hide_on_mobile: bool,
    #[serde(rename = "loadDelay")]
    pub load_delay_ms: u64,
    pub require_registration: bool,
    pub registration_fields: Vec<RegistrationField>,
    pub api_endpoint: Option<String>,
    #[serde(rename = "sessionTimeout")]
    pub session_timeout_minutes: u64,
    pub enable_history: bool,
    pub enable_analytics: bool,
    pub show_branding: bool,
    /// Maximum messages kept in the persisted snapshot. `None` keeps all.
    pub history_limit: Option<usize>,
    pub request_timeout_ms: u64,
}

impl Default for WidgetConfiguration {
    fn default() -> Self {
        Self {
            position: Position::BottomRight,
            color: "#4F46E5".to_owned(),
            title: "Chat with us".to_owned(),
            placeholder: "Type your message...".to_owned(),
            welcome_message: "Hi there! How can we help you today?".to_owned(),
            offline_message:
                "We're currently offline. Leave a message and we'll get back to you.".to_owned(),
            auto_open: false,
            hide_on_mobile: false,
            load_delay_ms: 0,
            require_registration: false,
            registration_fields: vec![RegistrationField::Name, RegistrationField::Email],
            api_endpoint: None,
            session_timeout_minutes: 30,
            enable_history: true,
            enable_analytics: false,
            show_branding: true,
            history_limit: Some(200),
            request_timeout_ms: 30_000,
        }
    }
}

impl WidgetConfiguration {
    /// Merge a host-supplied global configuration object over the defaults.
    pub fn from_global(global: serde_json::Value) -> WidgetResult<Self> {
        let config: Self = serde_json::from_value(global)
            .map_err(|e| WidgetError::InvalidConfig(e.to_string()))?;
        config.validate()
    }

    pub fn from_json_str(raw: &str) -> WidgetResult<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| WidgetError::InvalidConfig(e.to_string()))?;
        config.validate()
    }

    /// Normalize and check the configuration.
    ///
    /// Blank endpoints collapse to `None` and duplicate registration fields
    /// are dropped (the field list is a set). Endpoints are otherwise kept
    /// as written; relative ones are resolved against the host page later.
    pub fn validate(mut self) -> WidgetResult<Self> {
        self.api_endpoint = self
            .api_endpoint
            .take()
            .map(|endpoint| endpoint.trim().to_owned())
            .filter(|endpoint| !endpoint.is_empty());

        let mut seen = Vec::with_capacity(self.registration_fields.len());
        for field in self.registration_fields.drain(..) {
            if !seen.contains(&field) {
                seen.push(field);
            }
        }
        self.registration_fields = seen;

        if self.history_limit == Some(0) {
            return Err(WidgetError::InvalidConfig(
                "historyLimit must be positive or null".to_owned(),
            ));
        }
        Ok(self)
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.api_endpoint.as_deref()
    }

    /// Endpoint analytics events are posted to, when analytics is active.
    pub fn analytics_endpoint(&self) -> Option<String> {
        if !self.enable_analytics {
            return None;
        }
        self.endpoint()
            .map(|endpoint| format!("{}/analytics", endpoint.trim_end_matches('/')))
    }
}
