//! Widget runtime: the state machine, session lifecycle, and message relay of
//! one embedded chat widget.
//!
//! Every asynchronous step (chat reply, simulated delay, auto-open timer)
//! runs on its own task and posts a [`WidgetMsg`] back to the owning
//! [`WidgetInstance`], which applies it in [`WidgetInstance::update`]. The
//! instance is the only place widget state is mutated.

mod instance;

pub use instance::{WidgetInstance, WidgetMsg};

use std::sync::Arc;
use std::time::Duration;

use guestchat_backend::{SIMULATED_REPLY_DELAY, analytics_for, chat_backend_for};
use guestchat_protocol::{AnalyticsPort, ChatBackendPort, StoragePort, WidgetConfiguration};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub simulated_reply_delay: Duration,
    pub event_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            simulated_reply_delay: SIMULATED_REPLY_DELAY,
            event_buffer: 64,
        }
    }
}

impl RuntimeConfig {
    pub fn simulated_reply_delay(mut self, delay: Duration) -> Self {
        self.simulated_reply_delay = delay;
        self
    }
}

/// Outside-world adapters a widget instance talks to.
#[derive(Clone)]
pub struct WidgetPorts {
    pub storage: Arc<dyn StoragePort>,
    pub chat: Arc<dyn ChatBackendPort>,
    pub analytics: Arc<dyn AnalyticsPort>,
}

impl WidgetPorts {
    /// Wire the adapters a configuration calls for on top of `storage`.
    pub fn for_config(
        config: &WidgetConfiguration,
        runtime: &RuntimeConfig,
        storage: Arc<dyn StoragePort>,
    ) -> Self {
        Self {
            storage,
            chat: chat_backend_for(config, runtime.simulated_reply_delay),
            analytics: analytics_for(config),
        }
    }
}
