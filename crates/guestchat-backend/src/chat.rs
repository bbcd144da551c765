use std::time::Duration;

use async_trait::async_trait;
use guestchat_protocol::{
    ChatBackendPort, ChatReply, ChatRequest, SIMULATED_REPLY, WidgetError, WidgetResult,
};
use reqwest::Client;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Posts visitor messages to the configured chat endpoint.
#[derive(Debug, Clone)]
pub struct HttpChatBackend {
    client: Client,
    endpoint: String,
    request_timeout: Duration,
}

impl HttpChatBackend {
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            request_timeout,
        }
    }

    async fn post(&self, request: &ChatRequest) -> WidgetResult<ChatReply> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| WidgetError::Network(format!("failed to reach chat endpoint: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WidgetError::Network(format!("failed to read chat response: {e}")))?;

        // The status is informational only: any JSON body is accepted.
        if !status.is_success() {
            warn!(%status, "chat endpoint answered with an error status");
        }

        serde_json::from_str::<ChatReply>(&body)
            .map_err(|e| WidgetError::InvalidResponse(format!("chat response is not JSON: {e}")))
    }
}

#[async_trait]
impl ChatBackendPort for HttpChatBackend {
    #[instrument(
        skip(self, request),
        fields(
            endpoint = %self.endpoint,
            session_id = %request.session_id,
            message_len = request.message.len()
        )
    )]
    async fn send(&self, request: ChatRequest) -> WidgetResult<ChatReply> {
        let limit_ms = u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX);
        match timeout(self.request_timeout, self.post(&request)).await {
            Ok(result) => {
                let reply = result?;
                debug!(has_message = reply.message.is_some(), "chat reply received");
                Ok(reply)
            }
            Err(_) => {
                warn!(timeout_ms = limit_ms, "chat request timed out");
                Err(WidgetError::Timeout(limit_ms))
            }
        }
    }
}

/// Stand-in responder used when the host configured no endpoint.
#[derive(Debug, Clone)]
pub struct SimulatedChatBackend {
    delay: Duration,
    reply: String,
}

impl SimulatedChatBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            reply: SIMULATED_REPLY.to_owned(),
        }
    }
}

#[async_trait]
impl ChatBackendPort for SimulatedChatBackend {
    async fn send(&self, request: ChatRequest) -> WidgetResult<ChatReply> {
        debug!(
            delay_ms = u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX),
            session_id = %request.session_id,
            "simulating chat reply"
        );
        tokio::time::sleep(self.delay).await;
        Ok(ChatReply {
            message: Some(self.reply.clone()),
        })
    }
}
