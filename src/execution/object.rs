use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::tracker::TrackerHandle;

/// Predicate deciding whether an execution should run for a trigger.
///
/// Receives the name of the triggering event and a handle for reading values.
pub type ValidationBlock = Arc<dyn Fn(&str, &TrackerHandle) -> bool + Send + Sync>;

/// Action run once validation passes.
pub type ExecutionBlock = Arc<dyn Fn(&str, &TrackerHandle) + Send + Sync>;

/// Description of an execution block to register.
///
/// The execution callback is a constructor argument, so a spec without one
/// cannot exist.
///
/// # Example
/// ```rust,ignore
/// let spec = ExecutionSpec::new("show-progress", ["ready"], |event, tracker| {
///     println!("{event} fired, count={}", tracker.integer_value_for_event("count"));
/// })
/// .when(|_, tracker| tracker.bool_value_for_event("ready"))
/// .keep_alive(true);
/// tracker.add_execution_block(spec);
/// ```
#[derive(Clone)]
pub struct ExecutionSpec {
    execution_id: String,
    trigger_events: Vec<String>,
    validation: Option<ValidationBlock>,
    execution: ExecutionBlock,
    keep_alive: bool,
}

impl ExecutionSpec {
    /// A one-shot execution listening to `events`, with no validation.
    pub fn new<I, S, F>(execution_id: impl Into<String>, events: I, execution: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&str, &TrackerHandle) + Send + Sync + 'static,
    {
        let mut trigger_events: Vec<String> = Vec::new();
        for event in events {
            let event = event.into();
            if !trigger_events.contains(&event) {
                trigger_events.push(event);
            }
        }

        Self {
            execution_id: execution_id.into(),
            trigger_events,
            validation: None,
            execution: Arc::new(execution),
            keep_alive: false,
        }
    }

    /// Only run when `validation` returns true.
    #[must_use]
    pub fn when<F>(mut self, validation: F) -> Self
    where
        F: Fn(&str, &TrackerHandle) -> bool + Send + Sync + 'static,
    {
        self.validation = Some(Arc::new(validation));
        self
    }

    /// Keep the execution registered after it runs (default: false).
    #[must_use]
    pub const fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// ID the execution will be registered under.
    #[must_use]
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Build the registrable object, not yet marked for deletion.
    #[must_use]
    pub fn into_object(self) -> ExecutionObject {
        ExecutionObject {
            execution_id: self.execution_id,
            trigger_events: self.trigger_events,
            validation: self.validation,
            execution: self.execution,
            keep_alive: self.keep_alive,
            marked_for_deletion: AtomicBool::new(false),
        }
    }
}

impl fmt::Debug for ExecutionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionSpec")
            .field("execution_id", &self.execution_id)
            .field("trigger_events", &self.trigger_events)
            .field("has_validation", &self.validation.is_some())
            .field("keep_alive", &self.keep_alive)
            .finish_non_exhaustive()
    }
}

/// A registered (validation, execution, listened events, keep-alive) tuple.
///
/// Objects are shared by identity between the registry, in-flight dispatches
/// and `execution_objects()` snapshots. Everything except the deletion mark is
/// immutable after registration.
pub struct ExecutionObject {
    execution_id: String,
    trigger_events: Vec<String>,
    validation: Option<ValidationBlock>,
    execution: ExecutionBlock,
    keep_alive: bool,
    marked_for_deletion: AtomicBool,
}

#[allow(missing_docs)]
impl ExecutionObject {
    #[must_use]
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    #[must_use]
    pub fn trigger_events(&self) -> &[String] {
        &self.trigger_events
    }

    #[must_use]
    pub fn listens_to(&self, event: &str) -> bool {
        self.trigger_events.iter().any(|e| e == event)
    }

    #[must_use]
    pub const fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    #[must_use]
    pub fn has_validation(&self) -> bool {
        self.validation.is_some()
    }

    /// True once the object has been consumed, replaced or removed.
    #[must_use]
    pub fn is_marked_for_deletion(&self) -> bool {
        self.marked_for_deletion.load(Ordering::Acquire)
    }

    /// Retire the object: no dispatch will run it after this.
    pub fn mark_for_deletion(&self) {
        self.marked_for_deletion.store(true, Ordering::Release);
    }

    /// Claim the object for its single execution.
    ///
    /// Returns false if another dispatch already claimed it, or it was retired.
    pub(crate) fn claim(&self) -> bool {
        !self.marked_for_deletion.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn validate(&self, event: &str, tracker: &TrackerHandle) -> bool {
        self.validation.as_ref().map_or(true, |v| v(event, tracker))
    }

    pub(crate) fn execute(&self, event: &str, tracker: &TrackerHandle) {
        (self.execution)(event, tracker);
    }
}

impl fmt::Debug for ExecutionObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionObject")
            .field("execution_id", &self.execution_id)
            .field("trigger_events", &self.trigger_events)
            .field("has_validation", &self.validation.is_some())
            .field("keep_alive", &self.keep_alive)
            .field("marked_for_deletion", &self.is_marked_for_deletion())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_events_are_deduplicated_in_order() {
        let obj = ExecutionSpec::new("id", ["b", "a", "b"], |_, _| {}).into_object();
        assert_eq!(obj.trigger_events(), ["b".to_string(), "a".to_string()]);
        assert!(obj.listens_to("a"));
        assert!(!obj.listens_to("c"));
    }

    #[test]
    fn defaults_are_one_shot_without_validation() {
        let obj = ExecutionSpec::new("id", ["a"], |_, _| {}).into_object();
        assert!(!obj.keep_alive());
        assert!(!obj.has_validation());
        assert!(!obj.is_marked_for_deletion());
    }

    #[test]
    fn claim_succeeds_once() {
        let obj = ExecutionSpec::new("id", ["a"], |_, _| {}).into_object();
        assert!(obj.claim());
        assert!(!obj.claim());
        assert!(obj.is_marked_for_deletion());
    }

    #[test]
    fn retired_object_cannot_be_claimed() {
        let obj = ExecutionSpec::new("id", ["a"], |_, _| {})
            .keep_alive(true)
            .into_object();
        obj.mark_for_deletion();
        assert!(!obj.claim());
    }
}
