use guestchat_protocol::{
    RegistrationForm, RegistrationOutcome, RequestId, WidgetEventStream, WidgetState, WidgetView,
};
use guestchat_runtime::WidgetInstance;
use tracing::{instrument, warn};

/// The `<guest-chat>` element surface exposed to the host page.
///
/// Host-facing calls never fail: rejected operations are logged and
/// dropped.
pub struct ChatElement {
    instance: WidgetInstance,
    connected: bool,
}

impl ChatElement {
    pub fn new(instance: WidgetInstance) -> Self {
        Self {
            instance,
            connected: false,
        }
    }

    /// Element inserted into the document. Mounts the widget once.
    pub fn connected(&mut self) {
        if self.connected {
            return;
        }
        self.connected = true;
        self.instance.mount();
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn open(&mut self) {
        self.instance.open();
    }

    pub fn close(&mut self) {
        self.instance.close();
    }

    pub fn toggle(&mut self) {
        self.instance.toggle();
    }

    #[instrument(skip(self, text))]
    pub fn send_message(&mut self, text: &str) -> Option<RequestId> {
        match self.instance.send_message(text) {
            Ok(request_id) => Some(request_id),
            Err(error) => {
                warn!(%error, "message not sent");
                None
            }
        }
    }

    pub fn register(&mut self, form: &RegistrationForm) -> RegistrationOutcome {
        self.instance.register_user(form)
    }

    /// `message-sent` and `response-received` events.
    pub fn subscribe(&self) -> WidgetEventStream {
        self.instance.subscribe()
    }

    pub fn state(&self) -> WidgetState {
        self.instance.state()
    }

    pub fn view(&self) -> WidgetView {
        self.instance.view()
    }

    /// Apply completions that have already arrived.
    pub fn poll(&mut self) -> usize {
        self.instance.process_ready()
    }

    /// Wait for every outstanding reply and timer.
    pub async fn settle(&mut self) {
        self.instance.settle().await;
    }

    pub fn instance(&self) -> &WidgetInstance {
        &self.instance
    }

    pub fn instance_mut(&mut self) -> &mut WidgetInstance {
        &mut self.instance
    }
}
