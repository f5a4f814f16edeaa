use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scope::EventScope;
use crate::value::Value;

/// A registered event: its current value, the value it resets to, and its scope.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    name: String,
    initial_value: Value,
    value: Value,
    scope: EventScope,
    updated_at: DateTime<Utc>,
}

impl EventRecord {
    /// A freshly registered record whose value equals its initial value.
    #[must_use]
    pub fn new(name: impl Into<String>, initial_value: impl Into<Value>, scope: EventScope) -> Self {
        let initial_value = initial_value.into();
        Self {
            name: name.into(),
            value: initial_value.clone(),
            initial_value,
            scope,
            updated_at: Utc::now(),
        }
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[allow(missing_docs)]
    #[must_use]
    pub const fn initial_value(&self) -> &Value {
        &self.initial_value
    }

    #[allow(missing_docs)]
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    #[allow(missing_docs)]
    #[must_use]
    pub const fn scope(&self) -> EventScope {
        self.scope
    }

    /// When the value was last written or reset.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub(crate) fn set(&mut self, value: Value) {
        self.value = value;
        self.updated_at = Utc::now();
    }

    pub(crate) fn reset(&mut self) {
        self.value = self.initial_value.clone();
        self.updated_at = Utc::now();
    }

    /// Serializable copy of the record.
    #[must_use]
    pub fn snapshot(&self) -> EventSnapshot {
        EventSnapshot {
            name: self.name.clone(),
            scope: self.scope,
            value: self.value.clone(),
            initial_value: self.initial_value.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Serializable point-in-time copy of an event.
///
/// Hosts that persist `App` or `Session` values hand these to their own
/// storage and feed them back through `restore_events` on the next start.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub name: String,
    pub scope: EventScope,
    pub value: Value,
    pub initial_value: Value,
    pub updated_at: DateTime<Utc>,
}
