//! Write lifecycle notifications

use quarry_core::{Record, Value};
use std::fmt;

use crate::config::WriteAction;

/// Before or after the store is mutated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventPhase {
    Before,
    After,
}

/// Notification emitted around every write
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryEvent {
    pub phase: EventPhase,
    pub action: WriteAction,
    /// Entity name of the emitting repository
    pub entity: String,
    /// Primary key of the affected row, when the write targets one row
    pub id: Option<Value>,
    /// Attributes before the write, the stored row after it
    pub payload: Option<Record>,
}

impl RepositoryEvent {
    pub fn before(action: WriteAction, entity: &str) -> Self {
        Self {
            phase: EventPhase::Before,
            action,
            entity: entity.to_string(),
            id: None,
            payload: None,
        }
    }

    pub fn after(action: WriteAction, entity: &str) -> Self {
        Self {
            phase: EventPhase::After,
            ..Self::before(action, entity)
        }
    }

    pub fn with_id(mut self, id: Value) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_payload(mut self, payload: Record) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Event name such as `user.creating` or `user.deleted`
    pub fn name(&self) -> String {
        let verb = match (self.action, self.phase) {
            (WriteAction::Create, EventPhase::Before) => "creating",
            (WriteAction::Create, EventPhase::After) => "created",
            (WriteAction::Update, EventPhase::Before) => "updating",
            (WriteAction::Update, EventPhase::After) => "updated",
            (WriteAction::Delete, EventPhase::Before) => "deleting",
            (WriteAction::Delete, EventPhase::After) => "deleted",
        };
        format!("{}.{}", self.entity.to_lowercase(), verb)
    }
}

impl fmt::Display for RepositoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} ({})", self.name(), id),
            None => f.write_str(&self.name()),
        }
    }
}

/// Receives repository events; dispatch is synchronous and in registration
/// order
pub trait RepositoryListener: Send + Sync {
    fn on_event(&self, event: &RepositoryEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let event = RepositoryEvent::before(WriteAction::Create, "User");
        assert_eq!(event.name(), "user.creating");

        let event = RepositoryEvent::after(WriteAction::Delete, "user").with_id(Value::from(3i64));
        assert_eq!(event.name(), "user.deleted");
        assert_eq!(event.to_string(), "user.deleted (3)");
    }
}
