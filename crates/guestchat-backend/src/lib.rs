//! Outbound adapters for the widget: the chat endpoint, the simulated
//! responder used when no endpoint is configured, and analytics sinks.

mod analytics;
mod chat;

pub use analytics::{HttpAnalyticsSink, NoopAnalyticsSink};
pub use chat::{HttpChatBackend, SimulatedChatBackend};

use std::sync::Arc;
use std::time::Duration;

use guestchat_protocol::{AnalyticsPort, ChatBackendPort, WidgetConfiguration};
use reqwest::Url;
use tracing::warn;

/// Default delay before the simulated responder answers.
pub const SIMULATED_REPLY_DELAY: Duration = Duration::from_millis(1000);

/// Pick the chat backend a configuration calls for.
pub fn chat_backend_for(
    config: &WidgetConfiguration,
    simulated_delay: Duration,
) -> Arc<dyn ChatBackendPort> {
    match config.endpoint() {
        Some(endpoint) => Arc::new(HttpChatBackend::new(
            endpoint,
            Duration::from_millis(config.request_timeout_ms),
        )),
        None => Arc::new(SimulatedChatBackend::new(simulated_delay)),
    }
}

/// Pick the analytics sink a configuration calls for.
pub fn analytics_for(config: &WidgetConfiguration) -> Arc<dyn AnalyticsPort> {
    match config.analytics_endpoint() {
        Some(url) => Arc::new(HttpAnalyticsSink::new(
            url,
            Duration::from_millis(config.request_timeout_ms),
        )),
        None => Arc::new(NoopAnalyticsSink),
    }
}

/// Resolve `endpoint` the way a page's `fetch` would: absolute http(s) URLs
/// are used verbatim, relative ones are joined onto `page_url`.
pub fn resolve_endpoint(endpoint: &str, page_url: &str) -> Option<String> {
    let is_http = |url: &Url| matches!(url.scheme(), "http" | "https");
    if let Ok(url) = Url::parse(endpoint) {
        return is_http(&url).then(|| endpoint.to_owned());
    }
    let url = Url::parse(page_url).ok()?.join(endpoint).ok()?;
    is_http(&url).then(|| url.to_string())
}

/// Rewrite the configured endpoint to the URL requests will go to.
///
/// An endpoint that cannot be resolved to an http(s) URL is dropped with a
/// warning and the widget falls back to the simulated responder.
pub fn resolve_config(mut config: WidgetConfiguration, page_url: &str) -> WidgetConfiguration {
    if let Some(endpoint) = config.api_endpoint.take() {
        config.api_endpoint = resolve_endpoint(&endpoint, page_url);
        if config.api_endpoint.is_none() {
            warn!(
                endpoint = %endpoint,
                page_url,
                "apiEndpoint is not a reachable http(s) URL; using simulated replies"
            );
        }
    }
    config
}
