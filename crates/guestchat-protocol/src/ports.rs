//! Runtime boundary ports for the widget.
//!
//! These traits are the only boundary between a widget instance and the
//! outside world: the browser's local storage, the chat endpoint, and the
//! analytics endpoint.
//!
//! Object-safety note:
//! - Network ports use `async-trait` for async dyn-dispatch.
//! - Storage is synchronous, like `localStorage`.
//! - Event subscriptions use a boxed stream (`WidgetEventStream`).

use crate::error::WidgetResult;
use crate::event::{AnalyticsEvent, WidgetEvent};
use crate::ids::SessionId;
use crate::session::UserData;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub type WidgetEventStream = BoxStream<'static, WidgetEvent>;

/// Body of `POST {apiEndpoint}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub session_id: SessionId,
    pub user_data: UserData,
}

/// Response of `POST {apiEndpoint}`. A missing `message` is tolerated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Facts about the host page the widget cannot configure itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEnvironment {
    pub url: String,
    pub is_mobile: bool,
}

/// Key/value persistence with `localStorage` semantics.
pub trait StoragePort: Send + Sync {
    fn get_item(&self, key: &str) -> WidgetResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> WidgetResult<()>;
    fn remove_item(&self, key: &str) -> WidgetResult<()>;
}

#[async_trait]
pub trait ChatBackendPort: Send + Sync {
    async fn send(&self, request: ChatRequest) -> WidgetResult<ChatReply>;
}

#[async_trait]
pub trait AnalyticsPort: Send + Sync {
    async fn track(&self, event: AnalyticsEvent) -> WidgetResult<()>;
}
