//! Registration form values and validation.

use crate::config::RegistrationField;
use crate::session::UserData;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Raw values typed into the registration form, keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationForm(IndexMap<RegistrationField, String>);

impl RegistrationForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: RegistrationField, value: impl Into<String>) -> Self {
        self.0.insert(field, value.into());
        self
    }

    pub fn set(&mut self, field: RegistrationField, value: impl Into<String>) {
        self.0.insert(field, value.into());
    }

    pub fn get(&self, field: RegistrationField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    /// Check every required field is present and non-blank after trimming.
    ///
    /// On success returns the trimmed answers in `required` order; on failure
    /// returns every offending field so all of them can be flagged at once.
    pub fn validate(&self, required: &[RegistrationField]) -> Result<UserData, Vec<RegistrationField>> {
        let mut answers = UserData::new();
        let mut invalid = Vec::new();

        for field in required {
            match self.get(*field).map(str::trim) {
                Some(value) if !value.is_empty() => {
                    answers.insert(field.as_str().to_owned(), value.to_owned());
                }
                _ => invalid.push(*field),
            }
        }

        if invalid.is_empty() {
            Ok(answers)
        } else {
            Err(invalid)
        }
    }
}

/// Result of a registration form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered,
    AlreadyRegistered,
    Rejected { invalid_fields: Vec<RegistrationField> },
}
