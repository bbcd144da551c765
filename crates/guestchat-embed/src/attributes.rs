//! Custom-element attribute coercion.
//!
//! Boolean attributes are presence flags, numeric attributes parse with a
//! fallback default, and string attributes are read verbatim.

use indexmap::IndexMap;
use std::str::FromStr;

use guestchat_protocol::{Position, RegistrationField, WidgetConfiguration};
use tracing::warn;

/// Attributes present on the `<guest-chat>` element, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementAttributes(IndexMap<String, String>);

impl ElementAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Attribute names are case-insensitive, as in HTML.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0
            .insert(name.into().to_ascii_lowercase(), value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.0.shift_remove(&name.to_ascii_lowercase());
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn string_or(&self, name: &str, default: &str) -> String {
        self.get_attribute(name).unwrap_or(default).to_owned()
    }

    pub fn number_or<T>(&self, name: &str, default: T) -> T
    where
        T: FromStr,
    {
        match self.get_attribute(name) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(attribute = name, value = raw, "ignoring non-numeric attribute");
                default
            }),
            None => default,
        }
    }

    /// Build a configuration from the element's attributes.
    ///
    /// Missing string and numeric attributes fall back to the built-in
    /// defaults; missing boolean attributes read as `false`.
    pub fn to_configuration(&self) -> WidgetConfiguration {
        let defaults = WidgetConfiguration::default();

        let position = match self.get_attribute("position") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = raw, "unknown position attribute; using default");
                Position::default()
            }),
            None => defaults.position,
        };

        let registration_fields = match self.get_attribute("registration-fields") {
            Some(raw) => parse_field_list(raw),
            None => defaults.registration_fields.clone(),
        };

        let history_limit = match self.get_attribute("history-limit") {
            Some(raw) if raw.trim().eq_ignore_ascii_case("none") => None,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => Some(limit),
                _ => {
                    warn!(value = raw, "ignoring invalid history-limit");
                    defaults.history_limit
                }
            },
            None => defaults.history_limit,
        };

        WidgetConfiguration {
            position,
            color: self.string_or("primary-color", &defaults.color),
            title: self.string_or("title", &defaults.title),
            placeholder: self.string_or("placeholder", &defaults.placeholder),
            welcome_message: self.string_or("welcome-message", &defaults.welcome_message),
            offline_message: self.string_or("offline-message", &defaults.offline_message),
            auto_open: self.has_attribute("auto-open"),
            hide_on_mobile: self.has_attribute("hide-on-mobile"),
            load_delay_ms: self.number_or("load-delay", defaults.load_delay_ms),
            require_registration: self.has_attribute("require-registration"),
            registration_fields,
            api_endpoint: self.get_attribute("api-endpoint").map(str::to_owned),
            session_timeout_minutes: self
                .number_or("session-timeout", defaults.session_timeout_minutes),
            enable_history: self.has_attribute("enable-history"),
            enable_analytics: self.has_attribute("enable-analytics"),
            show_branding: self.has_attribute("show-branding"),
            history_limit,
            request_timeout_ms: defaults.request_timeout_ms,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for ElementAttributes
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Self::new();
        for (name, value) in iter {
            attributes.set_attribute(name, value);
        }
        attributes
    }
}

fn parse_field_list(raw: &str) -> Vec<RegistrationField> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter_map(|name| match name.parse() {
            Ok(field) => Some(field),
            Err(_) => {
                warn!(field = name, "unknown registration field attribute");
                None
            }
        })
        .collect()
}
