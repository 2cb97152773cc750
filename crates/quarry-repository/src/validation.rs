//! Write validation hook
//!
//! Rule execution belongs to the caller. The repository only asks a
//! `Validator` before every create or update and refuses the write when it
//! reports errors.

use quarry_core::Record;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::WriteAction;

/// Field to messages map reported by a validator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against `field`
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Builder form of [`add`](Self::add)
    pub fn with(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.add(field, message);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Validates attributes before a write
pub trait Validator: Send + Sync {
    /// Check `attributes` for `action`; for updates only the changed
    /// attributes are passed
    fn validate(&self, action: WriteAction, attributes: &Record) -> Result<(), ValidationErrors>;
}

impl<F> Validator for F
where
    F: Fn(WriteAction, &Record) -> Result<(), ValidationErrors> + Send + Sync,
{
    fn validate(&self, action: WriteAction, attributes: &Record) -> Result<(), ValidationErrors> {
        self(action, attributes)
    }
}
