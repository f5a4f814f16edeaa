//! Event value storage.
//!
//! The store is pure data: it never notifies listeners. Every mutation is
//! issued by the trigger worker, so writes are linearized; reads may come
//! from any thread.

mod record;

pub use record::{EventRecord, EventSnapshot};

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::scope::EventScope;
use crate::value::Value;

/// Outcome of `EventStore::increment_if_numeric`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Increment {
    /// The event is not registered.
    Unregistered,
    /// The value was numeric and is now one larger.
    Incremented,
    /// The event is registered but its value is not numeric; it was left as-is.
    NotNumeric,
}

/// Name → record map behind a reader/writer lock.
#[derive(Debug, Default)]
pub struct EventStore {
    events: RwLock<HashMap<String, EventRecord>>,
}

impl EventStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // No lock is ever held across user code, so a poisoned lock still guards
    // consistent data.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, EventRecord>> {
        self.events.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, EventRecord>> {
        self.events.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or overwrite a record. Returns true if a previous record was replaced.
    pub fn register(&self, name: &str, initial_value: Value, scope: EventScope) -> bool {
        self.write()
            .insert(name.to_string(), EventRecord::new(name, initial_value, scope))
            .is_some()
    }

    /// True if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Number of registered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True if no event is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Current value, or `None` if unregistered.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<Value> {
        self.read().get(name).map(|r| r.value().clone())
    }

    /// Copy of the full record, or `None` if unregistered.
    #[must_use]
    pub fn snapshot(&self, name: &str) -> Option<EventSnapshot> {
        self.read().get(name).map(EventRecord::snapshot)
    }

    /// Integer view of the value; 0 when unregistered or not numeric.
    #[must_use]
    pub fn read_integer(&self, name: &str) -> i64 {
        self.read().get(name).map_or(0, |r| r.value().to_integer())
    }

    /// Float view of the value; 0.0 when unregistered or not numeric.
    #[must_use]
    pub fn read_float(&self, name: &str) -> f64 {
        self.read().get(name).map_or(0.0, |r| r.value().to_float())
    }

    /// Bool view of the value; false when unregistered or mismatched.
    #[must_use]
    pub fn read_bool(&self, name: &str) -> bool {
        self.read().get(name).is_some_and(|r| r.value().to_bool())
    }

    /// Sequence value; empty when unregistered or mismatched.
    #[must_use]
    pub fn read_sequence(&self, name: &str) -> Vec<Value> {
        self.read().get(name).map(|r| r.value().to_sequence()).unwrap_or_default()
    }

    /// Mapping value; empty when unregistered or mismatched.
    #[must_use]
    pub fn read_mapping(&self, name: &str) -> BTreeMap<String, Value> {
        self.read().get(name).map(|r| r.value().to_mapping()).unwrap_or_default()
    }

    /// String value; empty when unregistered or mismatched.
    #[must_use]
    pub fn read_string(&self, name: &str) -> String {
        self.read().get(name).map(|r| r.value().to_string_value()).unwrap_or_default()
    }

    /// Replace the value of a registered event. Returns false (and does nothing)
    /// for unregistered names.
    pub fn set_value(&self, name: &str, value: Value) -> bool {
        match self.write().get_mut(name) {
            Some(record) => {
                record.set(value);
                true
            }
            None => false,
        }
    }

    /// Bare-trigger semantics: add one to a numeric value.
    pub fn increment_if_numeric(&self, name: &str) -> Increment {
        let mut guard = self.write();
        let Some(record) = guard.get_mut(name) else {
            return Increment::Unregistered;
        };
        match record.value().incremented() {
            Some(next) => {
                record.set(next);
                Increment::Incremented
            }
            None => Increment::NotNumeric,
        }
    }

    /// Restore one event to its initial value. Returns false for unregistered names.
    pub fn reset_one(&self, name: &str) -> bool {
        match self.write().get_mut(name) {
            Some(record) => {
                record.reset();
                true
            }
            None => false,
        }
    }

    /// Restore every event whose scope is in `scopes` (all events for `None`).
    /// Returns the number of events reset.
    pub fn reset_all(&self, scopes: Option<&[EventScope]>) -> usize {
        let mut guard = self.write();
        let mut count = 0;
        for record in guard.values_mut() {
            if scopes.map_or(true, |s| s.contains(&record.scope())) {
                record.reset();
                count += 1;
            }
        }
        count
    }

    /// Snapshots of every event whose scope is in `scopes`, sorted by name.
    #[must_use]
    pub fn export(&self, scopes: Option<&[EventScope]>) -> Vec<EventSnapshot> {
        let mut out: Vec<EventSnapshot> = self
            .read()
            .values()
            .filter(|r| scopes.map_or(true, |s| s.contains(&r.scope())))
            .map(EventRecord::snapshot)
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Apply stored values to events registered under the same scope.
    ///
    /// Snapshots for unregistered events, or whose scope no longer matches the
    /// registration, are ignored. Returns the number of values applied.
    pub fn restore(&self, snapshots: &[EventSnapshot]) -> usize {
        let mut guard = self.write();
        let mut applied = 0;
        for snap in snapshots {
            if let Some(record) = guard.get_mut(&snap.name) {
                if record.scope() == snap.scope {
                    record.set(snap.value.clone());
                    applied += 1;
                }
            }
        }
        applied
    }
}
