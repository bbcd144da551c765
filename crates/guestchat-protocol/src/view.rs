//! Widget states and the rendered view.
//!
//! The state is what the visitor currently sees. The view is a snapshot of
//! everything a renderer needs to paint the floating affordance and panel.

use crate::config::{Position, RegistrationField};
use crate::session::{ChatMessage, Sender};
use serde::{Deserialize, Serialize};

/// Per-instance state machine.
///
/// `OpenUnregistered` is only reachable when registration is required and
/// the visitor has not registered yet. There is no terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetState {
    #[default]
    Closed,
    OpenUnregistered,
    OpenActive,
}

impl WidgetState {
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

/// One line of the rendered message list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub sender: Sender,
    pub text: String,
    /// Display-only lines (the welcome message) are never persisted.
    #[serde(default)]
    pub ephemeral: bool,
}

impl From<&ChatMessage> for TranscriptLine {
    fn from(message: &ChatMessage) -> Self {
        Self {
            sender: message.sender,
            text: message.text.clone(),
            ephemeral: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetView {
    pub visible: bool,
    pub state: WidgetState,
    pub position: Position,
    pub color: String,
    pub title: String,
    pub placeholder: String,
    pub show_branding: bool,
    pub typing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_notice: Option<String>,
    #[serde(default)]
    pub registration_fields: Vec<RegistrationField>,
    #[serde(default)]
    pub flagged_fields: Vec<RegistrationField>,
    #[serde(default)]
    pub transcript: Vec<TranscriptLine>,
}
