//! # guestchat-protocol: canonical widget protocol
//!
//! This crate defines the shared types, event taxonomy, and trait interfaces
//! that the guestchat widget runtime, its storage adapters, and its HTTP
//! adapters depend on.
//!
//! It pulls in no runtime or HTTP crates (no tokio, no reqwest).
//!
//! ## Module Overview
//!
//! - [`ids`]: Typed ID wrappers (SessionId, RequestId)
//! - [`config`]: WidgetConfiguration, Position, RegistrationField
//! - [`session`]: WidgetSession snapshot, ChatMessage, Sender
//! - [`registration`]: RegistrationForm and field validation
//! - [`event`]: WidgetEvent (custom element events), AnalyticsEvent
//! - [`view`]: WidgetState machine states and the rendered WidgetView
//! - [`ports`]: Runtime boundary ports (storage, chat backend, analytics)
//! - [`error`]: WidgetError, WidgetResult

pub mod config;
pub mod error;
pub mod event;
pub mod ids;
pub mod ports;
pub mod registration;
pub mod session;
pub mod view;

// Re-export the most commonly used types at the crate root.
pub use config::{Position, RegistrationField, WidgetConfiguration};
pub use error::{WidgetError, WidgetResult};
pub use event::{AnalyticsEvent, AnalyticsEventName, EventDetail, WidgetEvent};
pub use ids::{RequestId, SessionId};
pub use ports::{
    AnalyticsPort, ChatBackendPort, ChatReply, ChatRequest, HostEnvironment, StoragePort,
    WidgetEventStream,
};
pub use registration::{RegistrationForm, RegistrationOutcome};
pub use session::{ChatMessage, Sender, UserData, WidgetSession};
pub use view::{TranscriptLine, WidgetState, WidgetView};

/// Fixed local storage key holding the persisted session snapshot.
pub const SESSION_STORAGE_KEY: &str = "guestchat_session";

/// Reply appended when the chat endpoint answers without a `message` field.
pub const DEFAULT_REPLY: &str = "Thank you for your message. We'll get back to you soon.";

/// Reply appended when the chat endpoint cannot be reached or answers garbage.
pub const CONNECTION_ERROR_REPLY: &str =
    "Sorry, I'm having trouble connecting right now. Please try again later.";

/// Reply produced by the simulated backend when no endpoint is configured.
pub const SIMULATED_REPLY: &str = "Thanks for your message! Our team will respond shortly.";
