use futures_util::StreamExt;
use guestchat_protocol::{WidgetEvent, WidgetEventStream};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

/// Fan-out of widget events to host listeners.
///
/// Publishing never blocks and never fails: events sent while nobody is
/// listening are dropped, and slow listeners skip what they lagged behind on.
#[derive(Clone, Debug)]
pub struct EventStreamHub {
    sender: broadcast::Sender<WidgetEvent>,
}

impl Default for EventStreamHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventStreamHub {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: WidgetEvent) {
        let name = event.name();
        let listeners = self.sender.send(event).unwrap_or(0);
        debug!(event = name, listeners, "widget event published");
    }

    pub fn subscribe_stream(&self) -> WidgetEventStream {
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(|item| async move { item.ok() })
            .boxed()
    }
}
