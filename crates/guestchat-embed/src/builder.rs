use std::sync::Arc;

use guestchat_backend::resolve_config;
use guestchat_protocol::{
    AnalyticsPort, ChatBackendPort, HostEnvironment, StoragePort, WidgetConfiguration,
    WidgetResult,
};
use guestchat_runtime::{RuntimeConfig, WidgetInstance, WidgetPorts};
use guestchat_store::MemoryStorage;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::ChatElement;
use crate::attributes::ElementAttributes;

/// Assembles a widget instance from a configuration and the host's
/// adapters.
///
/// Adapters not supplied explicitly are derived from the configuration:
/// the HTTP chat backend when an endpoint is set, the simulated responder
/// otherwise, and in-memory storage.
pub struct WidgetBuilder {
    config: WidgetConfiguration,
    environment: HostEnvironment,
    runtime: RuntimeConfig,
    storage: Option<Arc<dyn StoragePort>>,
    chat: Option<Arc<dyn ChatBackendPort>>,
    analytics: Option<Arc<dyn AnalyticsPort>>,
}

impl WidgetBuilder {
    pub fn new(config: WidgetConfiguration) -> Self {
        Self {
            config,
            environment: HostEnvironment::default(),
            runtime: RuntimeConfig::default(),
            storage: None,
            chat: None,
            analytics: None,
        }
    }

    /// Start from the host's global configuration object.
    pub fn from_global(global: Value) -> WidgetResult<Self> {
        WidgetConfiguration::from_global(global).map(Self::new)
    }

    /// Start from the custom element's attributes.
    pub fn from_attributes(attributes: &ElementAttributes) -> Self {
        Self::new(attributes.to_configuration())
    }

    pub fn environment(mut self, environment: HostEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn runtime_config(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StoragePort>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn chat_backend(mut self, chat: Arc<dyn ChatBackendPort>) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn analytics(mut self, analytics: Arc<dyn AnalyticsPort>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    /// Validate the configuration and wire the instance. Nothing is loaded
    /// or scheduled until the instance is mounted.
    ///
    /// A relative `apiEndpoint` is resolved against the host page URL; one
    /// that cannot be resolved leaves the widget on simulated replies.
    pub fn build(self) -> WidgetResult<WidgetInstance> {
        let config = resolve_config(self.config.validate()?, &self.environment.url);
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));

        let mut ports = WidgetPorts::for_config(&config, &self.runtime, storage);
        if let Some(chat) = self.chat {
            ports.chat = chat;
        }
        if let Some(analytics) = self.analytics {
            ports.analytics = analytics;
        }

        debug!(
            endpoint = config.endpoint().unwrap_or("<simulated>"),
            history = config.enable_history,
            "widget assembled"
        );
        Ok(WidgetInstance::new(
            config,
            self.environment,
            ports,
            &self.runtime,
        ))
    }

    /// Build and mount in one step, as the embed script does on load.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip(self))]
    pub fn mount(self) -> WidgetResult<ChatElement> {
        let mut element = ChatElement::new(self.build()?);
        element.connected();
        Ok(element)
    }
}
