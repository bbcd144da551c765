//! Error types for the widget protocol.

use thiserror::Error;

/// Errors that can occur in widget operations and adapters.
#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("registration required before chatting")]
    RegistrationRequired,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("request timed out after {0} ms")]
    Timeout(u64),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for WidgetError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Convenience result type for widget operations.
pub type WidgetResult<T> = Result<T, WidgetError>;
