use std::sync::Arc;

use chrono::{DateTime, Utc};
use guestchat_protocol::{
    SESSION_STORAGE_KEY, StoragePort, WidgetConfiguration, WidgetResult, WidgetSession,
};
use tracing::{debug, info, instrument, warn};

/// Loads and saves the single session snapshot of one widget.
///
/// Failures never escape: a snapshot that cannot be read, parsed, or
/// written is logged and the widget carries on in memory.
#[derive(Clone)]
pub struct SessionVault {
    storage: Arc<dyn StoragePort>,
    key: String,
    timeout_minutes: u64,
    history_limit: Option<usize>,
}

impl SessionVault {
    pub fn new(storage: Arc<dyn StoragePort>, timeout_minutes: u64) -> Self {
        Self {
            storage,
            key: SESSION_STORAGE_KEY.to_owned(),
            timeout_minutes,
            history_limit: None,
        }
    }

    pub fn for_config(storage: Arc<dyn StoragePort>, config: &WidgetConfiguration) -> Self {
        Self::new(storage, config.session_timeout_minutes).history_limit(config.history_limit)
    }

    pub fn history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self
    }

    /// Read the stored snapshot, discarding it whole when expired.
    #[instrument(skip(self), fields(key = %self.key))]
    pub fn load(&self, now: DateTime<Utc>) -> Option<WidgetSession> {
        let raw = match self.storage.get_item(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("no stored session");
                return None;
            }
            Err(error) => {
                warn!(%error, "failed reading stored session");
                return None;
            }
        };

        let session: WidgetSession = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(error) => {
                warn!(%error, "stored session is unreadable; starting fresh");
                return None;
            }
        };

        if session.is_expired(now, self.timeout_minutes) {
            info!(
                last_active = %session.last_active,
                timeout_minutes = self.timeout_minutes,
                "stored session expired; discarding"
            );
            return None;
        }

        debug!(messages = session.messages.len(), "stored session restored");
        Some(session)
    }

    /// Stamp `last_active`, apply the history cap, and write the snapshot.
    pub fn try_save(&self, session: &mut WidgetSession, now: DateTime<Utc>) -> WidgetResult<()> {
        session.last_active = now;
        if let Some(limit) = self.history_limit {
            let dropped = session.rotate_history(limit);
            if dropped > 0 {
                debug!(dropped, limit, "rotated oldest messages out of history");
            }
        }
        let payload = serde_json::to_string(session)?;
        self.storage.set_item(&self.key, &payload)
    }

    /// Like [`try_save`](Self::try_save) but logs and swallows failures.
    #[instrument(skip(self, session), fields(key = %self.key, messages = session.messages.len()))]
    pub fn save(&self, session: &mut WidgetSession, now: DateTime<Utc>) -> bool {
        match self.try_save(session, now) {
            Ok(()) => {
                debug!("session saved");
                true
            }
            Err(error) => {
                warn!(%error, "failed saving session; continuing in memory");
                false
            }
        }
    }
}
