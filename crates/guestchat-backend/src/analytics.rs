use std::time::Duration;

use async_trait::async_trait;
use guestchat_protocol::{AnalyticsEvent, AnalyticsPort, WidgetError, WidgetResult};
use reqwest::Client;
use tokio::time::timeout;
use tracing::{debug, instrument};

/// Posts analytics events to `<apiEndpoint>/analytics`. The response body
/// is ignored.
#[derive(Debug, Clone)]
pub struct HttpAnalyticsSink {
    client: Client,
    url: String,
    request_timeout: Duration,
}

impl HttpAnalyticsSink {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            request_timeout,
        }
    }
}

#[async_trait]
impl AnalyticsPort for HttpAnalyticsSink {
    #[instrument(skip(self, event), fields(url = %self.url, event = %event.event))]
    async fn track(&self, event: AnalyticsEvent) -> WidgetResult<()> {
        let post = self.client.post(&self.url).json(&event).send();
        let response = match timeout(self.request_timeout, post).await {
            Ok(result) => result.map_err(|e| {
                WidgetError::Network(format!("failed to post analytics event: {e}"))
            })?,
            Err(_) => {
                let limit_ms = u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX);
                return Err(WidgetError::Timeout(limit_ms));
            }
        };
        debug!(status = %response.status(), "analytics event posted");
        Ok(())
    }
}

/// Sink used when analytics is disabled or no endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnalyticsSink;

#[async_trait]
impl AnalyticsPort for NoopAnalyticsSink {
    async fn track(&self, _event: AnalyticsEvent) -> WidgetResult<()> {
        Ok(())
    }
}
