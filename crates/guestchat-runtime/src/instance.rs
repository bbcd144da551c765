use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use guestchat_protocol::{
    AnalyticsEvent, AnalyticsEventName, AnalyticsPort, CONNECTION_ERROR_REPLY, ChatBackendPort,
    ChatMessage, ChatReply, ChatRequest, DEFAULT_REPLY, HostEnvironment, RegistrationField,
    RegistrationForm, RegistrationOutcome, RequestId, Sender, TranscriptLine, WidgetConfiguration,
    WidgetError, WidgetEvent, WidgetEventStream, WidgetResult, WidgetSession, WidgetState,
    WidgetView,
};
use guestchat_store::{EventStreamHub, SessionVault};
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::{RuntimeConfig, WidgetPorts};

/// Completion posted back to the instance by an asynchronous step.
#[derive(Debug)]
pub enum WidgetMsg {
    AutoOpenElapsed,
    ReplyArrived {
        request_id: RequestId,
        result: WidgetResult<ChatReply>,
    },
}

/// One embedded widget: configuration, session, rendered state, and the
/// channel its background steps report into.
pub struct WidgetInstance {
    config: WidgetConfiguration,
    environment: HostEnvironment,
    vault: SessionVault,
    chat: Arc<dyn ChatBackendPort>,
    analytics: Arc<dyn AnalyticsPort>,
    events: EventStreamHub,
    session: WidgetSession,
    state: WidgetState,
    transcript: Vec<TranscriptLine>,
    flagged_fields: Vec<RegistrationField>,
    in_flight: Vec<RequestId>,
    auto_open_scheduled: bool,
    tx: mpsc::UnboundedSender<WidgetMsg>,
    rx: mpsc::UnboundedReceiver<WidgetMsg>,
}

impl WidgetInstance {
    pub fn new(
        config: WidgetConfiguration,
        environment: HostEnvironment,
        ports: WidgetPorts,
        runtime: &RuntimeConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let vault = SessionVault::for_config(ports.storage, &config);
        Self {
            config,
            environment,
            vault,
            chat: ports.chat,
            analytics: ports.analytics,
            events: EventStreamHub::new(runtime.event_buffer),
            session: WidgetSession::default(),
            state: WidgetState::Closed,
            transcript: Vec::new(),
            flagged_fields: Vec::new(),
            in_flight: Vec::new(),
            auto_open_scheduled: false,
            tx,
            rx,
        }
    }

    /// Initialize the instance: restore the stored session and, when
    /// configured, schedule the auto-open timer.
    ///
    /// The widget is always `Closed` when this returns. Must be called from
    /// within a tokio runtime.
    #[instrument(skip(self), fields(auto_open = self.config.auto_open))]
    pub fn mount(&mut self) {
        self.load_session();

        if self.config.auto_open && self.is_visible() && !self.auto_open_scheduled {
            let delay = Duration::from_millis(self.config.load_delay_ms);
            let tx = self.tx.clone();
            self.auto_open_scheduled = true;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(WidgetMsg::AutoOpenElapsed);
            });
            debug!(delay_ms = self.config.load_delay_ms, "auto-open scheduled");
        }
        info!(
            visible = self.is_visible(),
            restored_messages = self.session.messages.len(),
            "widget mounted"
        );
    }

    pub fn config(&self) -> &WidgetConfiguration {
        &self.config
    }

    pub fn state(&self) -> WidgetState {
        self.state
    }

    pub fn session(&self) -> &WidgetSession {
        &self.session
    }

    pub fn transcript(&self) -> &[TranscriptLine] {
        &self.transcript
    }

    pub fn flagged_fields(&self) -> &[RegistrationField] {
        &self.flagged_fields
    }

    /// True while at least one reply is outstanding.
    pub fn is_typing(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn is_visible(&self) -> bool {
        !(self.config.hide_on_mobile && self.environment.is_mobile)
    }

    pub fn subscribe(&self) -> WidgetEventStream {
        self.events.subscribe_stream()
    }

    pub fn view(&self) -> WidgetView {
        WidgetView {
            visible: self.is_visible(),
            state: self.state,
            position: self.config.position,
            color: self.config.color.clone(),
            title: self.config.title.clone(),
            placeholder: self.config.placeholder.clone(),
            show_branding: self.config.show_branding,
            typing: self.is_typing(),
            offline_notice: self
                .config
                .endpoint()
                .is_none()
                .then(|| self.config.offline_message.clone()),
            registration_fields: if self.state == WidgetState::OpenUnregistered {
                self.config.registration_fields.clone()
            } else {
                Vec::new()
            },
            flagged_fields: self.flagged_fields.clone(),
            transcript: self.transcript.clone(),
        }
    }

    fn registration_pending(&self) -> bool {
        self.config.require_registration && !self.session.is_registered
    }

    fn enter_active(&mut self) {
        self.state = WidgetState::OpenActive;
        if self.transcript.is_empty() && !self.config.welcome_message.is_empty() {
            self.transcript.push(TranscriptLine {
                sender: Sender::System,
                text: self.config.welcome_message.clone(),
                ephemeral: true,
            });
        }
    }

    /// `Closed → Open-*`. Lands on the registration form when the gate is
    /// still closed.
    pub fn open(&mut self) -> WidgetState {
        if !self.is_visible() {
            debug!("widget hidden on this device; ignoring open");
            return self.state;
        }
        if self.state.is_open() {
            return self.state;
        }

        if self.registration_pending() {
            self.state = WidgetState::OpenUnregistered;
        } else {
            self.enter_active();
        }
        info!(state = ?self.state, "widget opened");
        self.track_event(AnalyticsEventName::WidgetOpened, Map::new());
        self.state
    }

    /// `Open-* → Closed`. In-flight replies keep running.
    pub fn close(&mut self) -> WidgetState {
        if self.state.is_open() {
            self.state = WidgetState::Closed;
            info!(in_flight = self.in_flight.len(), "widget closed");
            self.track_event(AnalyticsEventName::WidgetClosed, Map::new());
        }
        self.state
    }

    pub fn toggle(&mut self) -> WidgetState {
        if self.state.is_open() {
            self.close()
        } else {
            self.open()
        }
    }

    /// Submit the registration form.
    ///
    /// Rejections flag the offending fields and change nothing else.
    #[instrument(skip(self, form))]
    pub fn register_user(&mut self, form: &RegistrationForm) -> RegistrationOutcome {
        if self.session.is_registered {
            debug!("visitor already registered");
            return RegistrationOutcome::AlreadyRegistered;
        }

        let answers = match form.validate(&self.config.registration_fields) {
            Ok(answers) => answers,
            Err(invalid_fields) => {
                warn!(invalid = ?invalid_fields, "registration rejected");
                self.flagged_fields = invalid_fields.clone();
                return RegistrationOutcome::Rejected { invalid_fields };
            }
        };

        self.flagged_fields.clear();
        self.session.user_data.extend(answers);
        self.session.is_registered = true;
        let session_id = self.session.ensure_session_id().clone();
        self.save_session();

        if self.state == WidgetState::OpenUnregistered {
            self.enter_active();
        }
        info!(%session_id, "visitor registered");
        self.track_event(AnalyticsEventName::UserRegistered, Map::new());
        RegistrationOutcome::Registered
    }

    /// Record the visitor's message and request a reply.
    ///
    /// The reply arrives later as [`WidgetMsg::ReplyArrived`]; transport
    /// failures become the fixed error reply rather than an `Err` here.
    #[instrument(skip(self, text), fields(message_len = text.len()))]
    pub fn send_message(&mut self, text: &str) -> WidgetResult<RequestId> {
        let text = text.trim();
        if text.is_empty() {
            return Err(WidgetError::EmptyMessage);
        }
        if self.registration_pending() {
            return Err(WidgetError::RegistrationRequired);
        }

        let session_id = self.session.ensure_session_id().clone();
        let message = ChatMessage::user(text);
        let timestamp = message.timestamp;
        self.append_message(message);
        self.events
            .publish(WidgetEvent::message_sent(text, timestamp));
        self.track_event(
            AnalyticsEventName::MessageSent,
            json_map(json!({ "messageLength": text.chars().count() })),
        );

        let request_id = RequestId::new_uuid();
        self.in_flight.push(request_id.clone());

        let request = ChatRequest {
            message: text.to_owned(),
            session_id,
            user_data: self.session.user_data.clone(),
        };
        let chat = Arc::clone(&self.chat);
        let tx = self.tx.clone();
        let task_request_id = request_id.clone();
        tokio::spawn(async move {
            let result = chat.send(request).await;
            let _ = tx.send(WidgetMsg::ReplyArrived {
                request_id: task_request_id,
                result,
            });
        });

        debug!(%request_id, "chat request dispatched");
        Ok(request_id)
    }

    /// Apply one completion.
    pub fn update(&mut self, msg: WidgetMsg) {
        match msg {
            WidgetMsg::AutoOpenElapsed => {
                self.auto_open_scheduled = false;
                if self.state == WidgetState::Closed {
                    debug!("auto-open timer elapsed");
                    self.open();
                }
            }
            WidgetMsg::ReplyArrived { request_id, result } => {
                self.in_flight.retain(|id| *id != request_id);
                let text = match result {
                    Ok(reply) => reply
                        .message
                        .filter(|message| !message.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_REPLY.to_owned()),
                    Err(error) => {
                        warn!(%request_id, %error, "chat request failed");
                        CONNECTION_ERROR_REPLY.to_owned()
                    }
                };
                let message = ChatMessage::system(text.clone());
                let timestamp = message.timestamp;
                self.append_message(message);
                self.events
                    .publish(WidgetEvent::response_received(text, timestamp));
                self.track_event(AnalyticsEventName::ResponseReceived, Map::new());
            }
        }
    }

    /// True while a reply or the auto-open timer is still due.
    pub fn has_pending_work(&self) -> bool {
        !self.in_flight.is_empty() || self.auto_open_scheduled
    }

    /// Wait for the next completion and apply it. Returns `false` when
    /// nothing is pending.
    pub async fn process_next(&mut self) -> bool {
        if !self.has_pending_work() {
            return false;
        }
        match self.rx.recv().await {
            Some(msg) => {
                self.update(msg);
                true
            }
            None => false,
        }
    }

    /// Apply every completion that has already arrived, without waiting.
    pub fn process_ready(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(msg) = self.rx.try_recv() {
            self.update(msg);
            applied += 1;
        }
        applied
    }

    /// Wait until every outstanding reply and timer has been applied.
    pub async fn settle(&mut self) {
        while self.process_next().await {}
    }

    fn append_message(&mut self, message: ChatMessage) {
        self.transcript.push(TranscriptLine::from(&message));
        if self.config.enable_history {
            self.session.messages.push(message);
            self.save_session();
        }
    }

    /// Restore the stored session, if history is enabled and it has not
    /// expired. Returns whether a session was restored.
    pub fn load_session(&mut self) -> bool {
        if !self.config.enable_history {
            return false;
        }
        let now = Utc::now();
        let Some(session) = self.vault.load(now) else {
            return false;
        };

        self.session = session;
        self.vault.save(&mut self.session, now);
        self.transcript = self
            .session
            .messages
            .iter()
            .map(TranscriptLine::from)
            .collect();
        info!(
            messages = self.session.messages.len(),
            registered = self.session.is_registered,
            "session restored"
        );
        true
    }

    /// Persist the full session snapshot. Failures are logged, not raised.
    pub fn save_session(&mut self) -> bool {
        if !self.config.enable_history {
            return false;
        }
        self.vault.save(&mut self.session, Utc::now())
    }

    /// Fire-and-forget analytics post. No-op unless analytics is enabled and
    /// an endpoint is configured.
    pub fn track_event(&self, name: AnalyticsEventName, data: Map<String, Value>) {
        if self.config.analytics_endpoint().is_none() {
            return;
        }
        let event = AnalyticsEvent::new(
            name,
            self.session.session_id.clone(),
            self.session.user_data.clone(),
            self.environment.url.clone(),
        )
        .with_data(data);
        let analytics = Arc::clone(&self.analytics);
        tokio::spawn(async move {
            if let Err(error) = analytics.track(event).await {
                warn!(event = %name, %error, "analytics event dropped");
            }
        });
    }
}

fn json_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use futures_util::StreamExt;
    use guestchat_backend::SimulatedChatBackend;
    use guestchat_protocol::{
        AnalyticsEvent, AnalyticsPort, CONNECTION_ERROR_REPLY, ChatBackendPort, ChatMessage,
        ChatReply, ChatRequest, DEFAULT_REPLY, HostEnvironment, RegistrationField,
        RegistrationForm, RegistrationOutcome, SESSION_STORAGE_KEY, SIMULATED_REPLY, Sender,
        SessionId, StoragePort, WidgetConfiguration, WidgetError, WidgetResult, WidgetSession,
        WidgetState,
    };
    use guestchat_store::{MemoryStorage, SessionVault};
    use parking_lot::Mutex;

    use super::WidgetInstance;
    use crate::{RuntimeConfig, WidgetPorts};

    /// Answers after a per-message delay: messages containing "slow" wait.
    struct ScriptedBackend {
        reply: Option<String>,
    }

    #[async_trait]
    impl ChatBackendPort for ScriptedBackend {
        async fn send(&self, request: ChatRequest) -> WidgetResult<ChatReply> {
            let delay = if request.message.contains("slow") { 80 } else { 5 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(ChatReply {
                message: self
                    .reply
                    .clone()
                    .map(|reply| format!("{reply}: {}", request.message)),
            })
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl ChatBackendPort for FailingBackend {
        async fn send(&self, _request: ChatRequest) -> WidgetResult<ChatReply> {
            Err(WidgetError::Network("connection refused".into()))
        }
    }

    #[derive(Default)]
    struct RecordingAnalytics {
        events: Mutex<Vec<AnalyticsEvent>>,
    }

    #[async_trait]
    impl AnalyticsPort for RecordingAnalytics {
        async fn track(&self, event: AnalyticsEvent) -> WidgetResult<()> {
            self.events.lock().push(event);
            Ok(())
        }
    }

    struct Harness {
        widget: WidgetInstance,
        storage: Arc<MemoryStorage>,
        analytics: Arc<RecordingAnalytics>,
    }

    fn harness_with(
        config: WidgetConfiguration,
        chat: Arc<dyn ChatBackendPort>,
        storage: Arc<MemoryStorage>,
    ) -> Harness {
        let analytics = Arc::new(RecordingAnalytics::default());
        let ports = WidgetPorts {
            storage: storage.clone(),
            chat,
            analytics: analytics.clone(),
        };
        let environment = HostEnvironment {
            url: "https://hotel.example/rooms".into(),
            is_mobile: false,
        };
        let widget = WidgetInstance::new(config, environment, ports, &RuntimeConfig::default());
        Harness {
            widget,
            storage,
            analytics,
        }
    }

    fn harness(config: WidgetConfiguration) -> Harness {
        harness_with(
            config,
            Arc::new(SimulatedChatBackend::new(Duration::from_millis(10))),
            Arc::new(MemoryStorage::new()),
        )
    }

    fn stored_session(storage: &MemoryStorage) -> Option<WidgetSession> {
        storage
            .get_item(SESSION_STORAGE_KEY)
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    fn gated_config() -> WidgetConfiguration {
        WidgetConfiguration {
            require_registration: true,
            registration_fields: vec![RegistrationField::Name, RegistrationField::Phone],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn initial_state_is_closed_even_with_auto_open() {
        let mut h = harness(WidgetConfiguration {
            auto_open: true,
            load_delay_ms: 20,
            ..Default::default()
        });
        h.widget.mount();
        assert_eq!(h.widget.state(), WidgetState::Closed);

        h.widget.settle().await;
        assert_eq!(h.widget.state(), WidgetState::OpenActive);
    }

    #[tokio::test]
    async fn auto_open_lands_on_registration_when_gated() {
        let mut h = harness(WidgetConfiguration {
            auto_open: true,
            ..gated_config()
        });
        h.widget.mount();
        h.widget.settle().await;
        assert_eq!(h.widget.state(), WidgetState::OpenUnregistered);
        assert_eq!(
            h.widget.view().registration_fields,
            vec![RegistrationField::Name, RegistrationField::Phone]
        );
    }

    #[tokio::test]
    async fn hidden_on_mobile_ignores_open_and_auto_open() {
        let config = WidgetConfiguration {
            hide_on_mobile: true,
            auto_open: true,
            ..Default::default()
        };
        let analytics = Arc::new(RecordingAnalytics::default());
        let ports = WidgetPorts {
            storage: Arc::new(MemoryStorage::new()),
            chat: Arc::new(FailingBackend),
            analytics,
        };
        let environment = HostEnvironment {
            url: String::new(),
            is_mobile: true,
        };
        let mut widget =
            WidgetInstance::new(config, environment, ports, &RuntimeConfig::default());
        widget.mount();
        assert!(!widget.has_pending_work());
        assert_eq!(widget.open(), WidgetState::Closed);
        assert!(!widget.view().visible);
    }

    #[tokio::test]
    async fn toggle_and_close_cycle_is_reenterable() {
        let mut h = harness(WidgetConfiguration::default());
        h.widget.mount();
        for _ in 0..3 {
            assert_eq!(h.widget.toggle(), WidgetState::OpenActive);
            assert_eq!(h.widget.toggle(), WidgetState::Closed);
        }
        h.widget.open();
        assert_eq!(h.widget.close(), WidgetState::Closed);
        assert_eq!(h.widget.close(), WidgetState::Closed);
    }

    #[tokio::test]
    async fn welcome_line_is_display_only() {
        let mut h = harness(WidgetConfiguration::default());
        h.widget.mount();
        h.widget.open();
        let transcript = h.widget.transcript();
        assert_eq!(transcript.len(), 1);
        assert!(transcript[0].ephemeral);
        assert!(h.widget.session().messages.is_empty());
    }

    #[tokio::test]
    async fn simulated_reply_follows_user_message() -> Result<()> {
        let mut h = harness(WidgetConfiguration {
            require_registration: false,
            api_endpoint: None,
            ..Default::default()
        });
        h.widget.mount();
        h.widget.open();

        h.widget.send_message("Hi")?;
        assert!(h.widget.is_typing());
        assert_eq!(h.widget.session().messages.len(), 1);

        h.widget.settle().await;
        assert!(!h.widget.is_typing());

        let messages = &h.widget.session().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[0].text, "Hi");
        assert_eq!(messages[1].sender, Sender::System);
        assert_eq!(messages[1].text, SIMULATED_REPLY);

        let stored = stored_session(&h.storage).expect("snapshot persisted");
        assert_eq!(stored.messages.len(), 2);
        assert_eq!(stored.messages[1].text, SIMULATED_REPLY);
        Ok(())
    }

    #[tokio::test]
    async fn unregistered_send_is_refused_without_side_effects() {
        let mut h = harness(gated_config());
        h.widget.mount();
        h.widget.open();

        let err = h.widget.send_message("Hi").unwrap_err();
        assert!(matches!(err, WidgetError::RegistrationRequired));
        assert!(h.widget.session().messages.is_empty());
        assert!(!h.widget.session().is_registered);
        assert!(h.storage.is_empty());
        assert!(!h.widget.is_typing());
    }

    #[tokio::test]
    async fn blank_message_is_refused() {
        let mut h = harness(WidgetConfiguration::default());
        h.widget.mount();
        assert!(matches!(
            h.widget.send_message("   "),
            Err(WidgetError::EmptyMessage)
        ));
        assert!(h.widget.transcript().is_empty());
    }

    #[tokio::test]
    async fn registration_with_blank_phone_is_rejected() {
        let mut h = harness(gated_config());
        h.widget.mount();
        h.widget.open();

        let form = RegistrationForm::new()
            .with(RegistrationField::Name, "Ann")
            .with(RegistrationField::Phone, "");
        let outcome = h.widget.register_user(&form);

        assert_eq!(
            outcome,
            RegistrationOutcome::Rejected {
                invalid_fields: vec![RegistrationField::Phone]
            }
        );
        assert!(!h.widget.session().is_registered);
        assert!(h.widget.session().user_data.is_empty());
        assert!(h.widget.session().session_id.is_none());
        assert_eq!(h.widget.flagged_fields(), &[RegistrationField::Phone]);
        assert_eq!(h.widget.state(), WidgetState::OpenUnregistered);
        assert!(h.storage.is_empty());
    }

    #[tokio::test]
    async fn registration_opens_chat_and_persists() -> Result<()> {
        let mut h = harness(gated_config());
        h.widget.mount();
        h.widget.open();

        let form = RegistrationForm::new()
            .with(RegistrationField::Name, "Ann")
            .with(RegistrationField::Phone, "555-0100");
        assert_eq!(h.widget.register_user(&form), RegistrationOutcome::Registered);

        let session = h.widget.session();
        assert!(session.is_registered);
        assert_eq!(session.user_data.get("name").map(String::as_str), Some("Ann"));
        assert_eq!(
            session.user_data.get("phone").map(String::as_str),
            Some("555-0100")
        );
        assert!(session.session_id.as_ref().is_some_and(|id| !id.as_str().is_empty()));
        assert_eq!(h.widget.state(), WidgetState::OpenActive);
        assert!(h.widget.flagged_fields().is_empty());

        let stored = stored_session(&h.storage).expect("snapshot persisted");
        assert!(stored.is_registered);
        assert_eq!(stored.session_id, session.session_id);

        h.widget.send_message("Hi")?;
        h.widget.settle().await;
        assert_eq!(h.widget.session().messages.len(), 2);

        let again = RegistrationForm::new()
            .with(RegistrationField::Name, "Bob")
            .with(RegistrationField::Phone, "1");
        assert_eq!(
            h.widget.register_user(&again),
            RegistrationOutcome::AlreadyRegistered
        );
        assert_eq!(
            h.widget.session().user_data.get("name").map(String::as_str),
            Some("Ann")
        );
        Ok(())
    }

    #[tokio::test]
    async fn failed_send_appends_single_error_reply() -> Result<()> {
        let mut h = harness_with(
            WidgetConfiguration {
                api_endpoint: Some("https://chat.example/api".into()),
                ..Default::default()
            },
            Arc::new(FailingBackend),
            Arc::new(MemoryStorage::new()),
        );
        h.widget.mount();
        h.widget.open();

        h.widget.send_message("Hi")?;
        h.widget.settle().await;

        let messages = &h.widget.session().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "Hi");
        let errors: Vec<_> = messages
            .iter()
            .filter(|m| m.sender == Sender::System && m.text == CONNECTION_ERROR_REPLY)
            .collect();
        assert_eq!(errors.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn reply_without_message_uses_default_text() -> Result<()> {
        let mut h = harness_with(
            WidgetConfiguration::default(),
            Arc::new(ScriptedBackend { reply: None }),
            Arc::new(MemoryStorage::new()),
        );
        h.widget.mount();
        h.widget.send_message("Hi")?;
        h.widget.settle().await;
        assert_eq!(h.widget.session().messages[1].text, DEFAULT_REPLY);
        Ok(())
    }

    #[tokio::test]
    async fn replies_interleave_in_arrival_order() -> Result<()> {
        let mut h = harness_with(
            WidgetConfiguration::default(),
            Arc::new(ScriptedBackend {
                reply: Some("re".into()),
            }),
            Arc::new(MemoryStorage::new()),
        );
        h.widget.mount();
        h.widget.send_message("slow one")?;
        h.widget.send_message("fast one")?;
        h.widget.settle().await;

        let texts: Vec<_> = h
            .widget
            .session()
            .messages
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(
            texts,
            ["slow one", "fast one", "re: fast one", "re: slow one"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn reply_landing_while_closed_is_still_recorded() -> Result<()> {
        let mut h = harness(WidgetConfiguration::default());
        h.widget.mount();
        h.widget.open();
        h.widget.send_message("Hi")?;
        h.widget.close();
        h.widget.settle().await;

        assert_eq!(h.widget.state(), WidgetState::Closed);
        assert_eq!(h.widget.session().messages.len(), 2);
        h.widget.open();
        assert_eq!(
            h.widget.transcript().last().map(|l| l.text.as_str()),
            Some(SIMULATED_REPLY)
        );
        Ok(())
    }

    #[tokio::test]
    async fn history_disabled_keeps_messages_in_transcript_only() -> Result<()> {
        let mut h = harness(WidgetConfiguration {
            enable_history: false,
            ..Default::default()
        });
        h.widget.mount();
        h.widget.send_message("Hi")?;
        h.widget.settle().await;

        assert!(h.widget.session().messages.is_empty());
        assert_eq!(h.widget.transcript().len(), 2);
        assert!(h.storage.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn mount_restores_session_and_refreshes_last_active() {
        let storage = Arc::new(MemoryStorage::new());
        let vault = SessionVault::new(storage.clone(), 30);
        let stale = Utc::now() - ChronoDuration::minutes(29);
        let mut seeded = WidgetSession::default();
        seeded.is_registered = true;
        seeded.session_id = Some(SessionId::from_string("S-restored"));
        seeded.user_data.insert("name".into(), "Ann".into());
        seeded.messages.push(ChatMessage::user("first"));
        seeded.messages.push(ChatMessage::system("second"));
        vault.save(&mut seeded, stale);

        let mut h = harness_with(
            gated_config(),
            Arc::new(FailingBackend),
            storage.clone(),
        );
        h.widget.mount();

        assert!(h.widget.session().same_contents(&seeded));
        let lines: Vec<_> = h.widget.transcript().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(lines, ["first", "second"]);
        assert_eq!(h.widget.open(), WidgetState::OpenActive);

        let stored = stored_session(&storage).expect("snapshot persisted");
        assert!(stored.last_active > stale);
    }

    #[tokio::test]
    async fn restored_transcript_respects_history_limit() {
        let storage = Arc::new(MemoryStorage::new());
        let vault = SessionVault::new(storage.clone(), 30);
        let mut seeded = WidgetSession::default();
        for text in ["one", "two", "three", "four", "five"] {
            seeded.messages.push(ChatMessage::user(text));
        }
        vault.save(&mut seeded, Utc::now());

        let mut h = harness_with(
            WidgetConfiguration {
                history_limit: Some(3),
                ..Default::default()
            },
            Arc::new(FailingBackend),
            storage.clone(),
        );
        h.widget.mount();

        let lines: Vec<_> = h.widget.transcript().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(lines, ["three", "four", "five"]);
        assert_eq!(h.widget.session().messages.len(), 3);
        let stored = stored_session(&storage).expect("snapshot persisted");
        assert_eq!(stored.messages.len(), 3);
    }

    #[tokio::test]
    async fn mount_discards_expired_session() {
        let storage = Arc::new(MemoryStorage::new());
        let vault = SessionVault::new(storage.clone(), 30);
        let mut seeded = WidgetSession::default();
        seeded.is_registered = true;
        seeded.session_id = Some(SessionId::from_string("S-old"));
        seeded.messages.push(ChatMessage::user("old"));
        vault.save(&mut seeded, Utc::now() - ChronoDuration::minutes(31));

        let mut h = harness_with(gated_config(), Arc::new(FailingBackend), storage);
        h.widget.mount();

        assert!(!h.widget.session().is_registered);
        assert!(h.widget.session().session_id.is_none());
        assert!(h.widget.transcript().is_empty());
        assert_eq!(h.widget.open(), WidgetState::OpenUnregistered);
    }

    #[tokio::test]
    async fn storage_failure_does_not_block_chat() -> Result<()> {
        let mut h = harness_with(
            WidgetConfiguration::default(),
            Arc::new(SimulatedChatBackend::new(Duration::from_millis(1))),
            Arc::new(MemoryStorage::with_quota(4)),
        );
        h.widget.mount();
        h.widget.send_message("Hi")?;
        h.widget.settle().await;
        assert_eq!(h.widget.session().messages.len(), 2);
        assert!(h.storage.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn events_are_emitted_for_sent_and_received() -> Result<()> {
        let mut h = harness(WidgetConfiguration::default());
        h.widget.mount();
        let mut events = h.widget.subscribe();

        h.widget.send_message("Hi")?;
        h.widget.settle().await;

        let sent = events.next().await.expect("message-sent");
        let received = events.next().await.expect("response-received");
        assert_eq!(sent.name(), "message-sent");
        assert_eq!(sent.detail().message, "Hi");
        assert_eq!(received.name(), "response-received");
        assert_eq!(received.detail().message, SIMULATED_REPLY);
        Ok(())
    }

    #[tokio::test]
    async fn analytics_only_tracked_when_enabled_with_endpoint() -> Result<()> {
        let mut quiet = harness(WidgetConfiguration {
            enable_analytics: true,
            ..Default::default()
        });
        quiet.widget.mount();
        quiet.widget.open();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(quiet.analytics.events.lock().is_empty());

        let mut h = harness_with(
            WidgetConfiguration {
                enable_analytics: true,
                api_endpoint: Some("https://chat.example/api".into()),
                ..Default::default()
            },
            Arc::new(ScriptedBackend {
                reply: Some("re".into()),
            }),
            Arc::new(MemoryStorage::new()),
        );
        h.widget.mount();
        h.widget.open();
        h.widget.send_message("Hi")?;
        h.widget.settle().await;
        h.widget.close();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let events = h.analytics.events.lock();
        let mut names: Vec<_> = events.iter().map(|e| e.event.as_str()).collect();
        names.sort_unstable();
        assert_eq!(
            names,
            [
                "message_sent",
                "response_received",
                "widget_closed",
                "widget_opened"
            ]
        );
        let sent = events
            .iter()
            .find(|e| e.event == "message_sent")
            .expect("message_sent tracked");
        assert_eq!(sent.url, "https://hotel.example/rooms");
        assert!(sent.session_id.is_some());
        assert_eq!(sent.data["messageLength"], 2);
        Ok(())
    }
}
