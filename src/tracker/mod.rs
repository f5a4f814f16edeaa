//! The event tracker: serialized trigger processing plus single-context dispatch.
//!
//! `EventTracker` owns the worker and dispatch threads. `TrackerHandle` is the
//! cheap, cloneable surface used by application code and passed to every
//! validation and execution callback.
//!
//! Mutators (`trigger_event`, `set_event`, resets) are fire-and-forget: they
//! enqueue onto the worker and return immediately. Readers go straight to the
//! store and observe whatever the worker has applied so far.
//!
//! Callbacks read the store when they run, not when the trigger was accepted.
//! If the same event changes twice before the first dispatch runs, both
//! evaluations see the later value: a keep-alive execution may run twice, once
//! or not at all for that pair. One-shot executions never run more than once.

/// Tracker configuration.
pub mod config;
/// Callback dispatch context.
pub mod dispatcher;
/// Serialized trigger worker.
pub(crate) mod processor;
/// Counters exposed through `stats()`.
pub mod stats;

pub use config::{DispatchMode, TrackerConfig};
pub use dispatcher::DispatchOutcome;
pub use stats::TrackerStats;

use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::error::{ExecutionError, TrackerError, TrackerResult};
use crate::execution::{ExecutionObject, ExecutionRegistry, ExecutionSpec};
use crate::scope::{EventScope, LifecycleTransition};
use crate::store::{EventSnapshot, EventStore};
use crate::value::Value;

use dispatcher::DispatchMsg;
use processor::Op;
use stats::Counters;

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) config: TrackerConfig,
    pub(crate) store: EventStore,
    pub(crate) registry: ExecutionRegistry,
    pub(crate) counters: Counters,
    pub(crate) ops_tx: Sender<Op>,
    pub(crate) dispatch_tx: Sender<DispatchMsg>,
    pub(crate) dispatch_rx: Receiver<DispatchMsg>,
    pub(crate) dispatch_thread: OnceLock<ThreadId>,
    pub(crate) host: HostContext,
    pub(crate) accepted: AtomicU64,
    pub(crate) closed: AtomicBool,
}

/// Ownership of the `Host` dispatch context.
///
/// Whoever holds it is the only thread allowed to run callbacks. The holder
/// may re-enter (a callback calling add-and-run); other threads wait or back off.
#[derive(Debug, Default)]
pub(crate) struct HostContext {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

impl HostContext {
    fn lock(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_owner(&self) -> bool {
        *self.lock() == Some(thread::current().id())
    }

    /// Take the context if nobody holds it.
    fn try_enter(&self) -> bool {
        let mut owner = self.lock();
        if owner.is_some() {
            return false;
        }
        *owner = Some(thread::current().id());
        true
    }

    /// Wait up to `timeout` for the context to become free, then take it.
    fn enter_within(&self, timeout: Duration) -> bool {
        let (mut owner, _) = self
            .released
            .wait_timeout_while(self.lock(), timeout, |owner| owner.is_some())
            .unwrap_or_else(PoisonError::into_inner);
        if owner.is_some() {
            return false;
        }
        *owner = Some(thread::current().id());
        true
    }

    fn leave(&self) {
        *self.lock() = None;
        self.released.notify_all();
    }
}

fn wait_reply<T>(rx: &Receiver<T>, config: &TrackerConfig, path: &str) -> TrackerResult<T> {
    rx.recv_timeout(config.flush_timeout()).map_err(|err| match err {
        RecvTimeoutError::Timeout => TrackerError::timeout(config.flush_timeout()),
        RecvTimeoutError::Disconnected => TrackerError::disconnected(path),
    })
}

/// Cloneable handle to a running tracker.
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    pub(crate) shared: Arc<Shared>,
}

impl TrackerHandle {
    /// Enqueue an operation on the worker. Returns false if the tracker is shut down.
    fn submit(&self, op: Op) -> bool {
        if self.shared.closed.load(Ordering::Acquire) || self.shared.ops_tx.send(op).is_err() {
            Counters::bump(&self.shared.counters.rejected_submissions);
            warn!("event tracker is shut down; operation rejected");
            return false;
        }
        self.shared.accepted.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// True when called from the context that runs callbacks right now.
    fn on_dispatch_thread(&self) -> bool {
        match self.shared.config.dispatch_mode {
            DispatchMode::Thread => self.shared.dispatch_thread.get() == Some(&thread::current().id()),
            DispatchMode::Host => self.shared.host.is_owner(),
        }
    }

    /// Configuration the tracker was started with.
    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.shared.config
    }

    // --- lifecycle -------------------------------------------------------

    /// Register (or re-register) an event and wait until the worker applied it.
    ///
    /// Re-registration overwrites the previous record, including its value.
    /// Call once per event on every process start.
    pub fn register_event(
        &self,
        event: &str,
        initial_value: impl Into<Value>,
        scope: EventScope,
    ) -> TrackerResult<()> {
        let (reply, rx) = bounded(1);
        let op = Op::Register {
            event: event.to_string(),
            initial_value: initial_value.into(),
            scope,
            reply,
        };
        if !self.submit(op) {
            return Err(TrackerError::disconnected("worker"));
        }
        wait_reply(&rx, &self.shared.config, "worker")
    }

    // --- mutators --------------------------------------------------------

    /// Add one to a numeric event and notify its listeners.
    ///
    /// Unregistered and non-numeric events are ignored: no value change and
    /// no notification.
    pub fn trigger_event(&self, event: &str) {
        self.submit(Op::Trigger {
            event: event.to_string(),
        });
    }

    /// Set a registered event's value and notify its listeners.
    pub fn set_event(&self, event: &str, value: impl Into<Value>) {
        self.submit(Op::Set {
            event: event.to_string(),
            value: value.into(),
        });
    }

    /// Reset one event to its initial value without notifying listeners.
    pub fn reset_event(&self, event: &str) {
        self.submit(Op::Reset {
            event: event.to_string(),
        });
    }

    /// Reset every event to its initial value without notifying listeners.
    pub fn reset_events(&self) {
        self.submit(Op::ResetScopes {
            scopes: None,
            reason: "reset_events",
        });
    }

    /// Return every `App`, `Session` and `Instance` event to a fresh-install baseline.
    pub fn reset_events_for_logout(&self) {
        self.apply_transition(LifecycleTransition::Logout);
    }

    /// Reset the scopes cleared by a host lifecycle transition.
    pub fn apply_transition(&self, transition: LifecycleTransition) {
        let reason = match transition {
            LifecycleTransition::Background => "background",
            LifecycleTransition::ProcessRestart => "process_restart",
            LifecycleTransition::Logout => "logout",
        };
        self.submit(Op::ResetScopes {
            scopes: Some(transition.scopes().to_vec()),
            reason,
        });
    }

    /// Apply previously exported values to matching registered events.
    ///
    /// No listeners are notified. Returns the number of values applied.
    pub fn restore_events(&self, snapshots: Vec<EventSnapshot>) -> TrackerResult<usize> {
        let (reply, rx) = bounded(1);
        if !self.submit(Op::Restore { snapshots, reply }) {
            return Err(TrackerError::disconnected("worker"));
        }
        wait_reply(&rx, &self.shared.config, "worker")
    }

    // --- readers ---------------------------------------------------------

    /// True if the event has been registered.
    #[must_use]
    pub fn is_registered(&self, event: &str) -> bool {
        self.shared.store.contains(event)
    }

    /// Integer value; 0 if unregistered or not numeric.
    #[must_use]
    pub fn integer_value_for_event(&self, event: &str) -> i64 {
        self.shared.store.read_integer(event)
    }

    /// Float value; 0.0 if unregistered or not numeric.
    #[must_use]
    pub fn float_value_for_event(&self, event: &str) -> f64 {
        self.shared.store.read_float(event)
    }

    /// Bool value; false if unregistered or mismatched.
    #[must_use]
    pub fn bool_value_for_event(&self, event: &str) -> bool {
        self.shared.store.read_bool(event)
    }

    /// Sequence value; empty if unregistered or mismatched.
    #[must_use]
    pub fn array_value_for_event(&self, event: &str) -> Vec<Value> {
        self.shared.store.read_sequence(event)
    }

    /// Mapping value; empty if unregistered or mismatched.
    #[must_use]
    pub fn dictionary_value_for_event(&self, event: &str) -> BTreeMap<String, Value> {
        self.shared.store.read_mapping(event)
    }

    /// String value; empty if unregistered or mismatched.
    #[must_use]
    pub fn string_value_for_event(&self, event: &str) -> String {
        self.shared.store.read_string(event)
    }

    /// Raw value, `None` if unregistered.
    #[must_use]
    pub fn value_for_event(&self, event: &str) -> Option<Value> {
        self.shared.store.value(event)
    }

    /// Full record copy, `None` if unregistered.
    #[must_use]
    pub fn event_snapshot(&self, event: &str) -> Option<EventSnapshot> {
        self.shared.store.snapshot(event)
    }

    /// Snapshots of the events in `scopes` (all events for `None`), sorted by name.
    #[must_use]
    pub fn export_events(&self, scopes: Option<&[EventScope]>) -> Vec<EventSnapshot> {
        self.shared.store.export(scopes)
    }

    // --- executions ------------------------------------------------------

    /// Register an execution block, replacing any block with the same ID.
    pub fn add_execution_block(&self, spec: ExecutionSpec) -> Arc<ExecutionObject> {
        let object = Arc::new(spec.into_object());
        let replaced = self.shared.registry.upsert(Arc::clone(&object));
        debug!(
            execution_id = object.execution_id(),
            events = ?object.trigger_events(),
            keep_alive = object.keep_alive(),
            replaced = replaced.is_some(),
            "execution registered"
        );
        object
    }

    /// Register an execution block and, if `validate_immediately`, evaluate it
    /// once against the current values before returning.
    pub fn add_execution_block_with(
        &self,
        spec: ExecutionSpec,
        validate_immediately: bool,
    ) -> TrackerResult<Arc<ExecutionObject>> {
        let object = self.add_execution_block(spec);
        if validate_immediately {
            self.run_immediately(&object)?;
        }
        Ok(object)
    }

    /// Register an execution block and evaluate it once right away.
    ///
    /// The first listened event is passed to the callbacks as the triggering
    /// event. Returns after the evaluation finished on the dispatch context.
    /// In `Host` mode the caller becomes that context for the evaluation, once
    /// a `run_pending` in progress on another thread returned.
    pub fn add_and_run_execution_block(&self, spec: ExecutionSpec) -> TrackerResult<DispatchOutcome> {
        let object = self.add_execution_block(spec);
        self.run_immediately(&object)
    }

    fn run_immediately(&self, object: &Arc<ExecutionObject>) -> TrackerResult<DispatchOutcome> {
        let Some(event) = object.trigger_events().first().cloned() else {
            return Ok(DispatchOutcome::Skipped);
        };

        if self.on_dispatch_thread() {
            return Ok(dispatcher::evaluate(object, &event, self));
        }

        // Host mode: become the dispatch context for this one evaluation, after
        // any `run_pending` in progress on another thread finished.
        if self.shared.config.dispatch_mode == DispatchMode::Host {
            let timeout = self.shared.config.flush_timeout();
            if !self.shared.host.enter_within(timeout) {
                return Err(TrackerError::timeout(timeout));
            }
            let outcome = dispatcher::evaluate(object, &event, self);
            self.shared.host.leave();
            return Ok(outcome);
        }

        if self.shared.closed.load(Ordering::Acquire) {
            return Err(TrackerError::disconnected("dispatch"));
        }
        let (reply, rx) = bounded(1);
        self.shared
            .dispatch_tx
            .send(DispatchMsg::Immediate {
                event,
                object: Arc::clone(object),
                reply,
            })
            .map_err(|_| TrackerError::disconnected("dispatch"))?;
        wait_reply(&rx, &self.shared.config, "dispatch")
    }

    /// Remove an execution block by ID. It will not run again.
    pub fn remove_execution_block(&self, execution_id: &str) -> Option<Arc<ExecutionObject>> {
        self.shared.registry.remove(execution_id)
    }

    /// Remove every execution block. Returns how many were removed.
    pub fn remove_all_execution_blocks(&self) -> usize {
        self.shared.registry.remove_all()
    }

    /// Copy of the registered execution objects.
    ///
    /// The objects themselves are shared with the tracker; marking one for
    /// deletion retires it for real.
    #[must_use]
    pub fn execution_objects(&self) -> Vec<Arc<ExecutionObject>> {
        self.shared.registry.snapshot_all()
    }

    // --- synchronization -------------------------------------------------

    /// Wait until everything submitted before this call has been processed.
    ///
    /// In `Thread` mode this includes the resulting callbacks (unless called
    /// from a callback, where it only waits for the worker). In `Host` mode it
    /// waits for the worker, then runs pending dispatches on the caller.
    pub fn flush(&self) -> TrackerResult<()> {
        let through_dispatch =
            self.shared.config.dispatch_mode == DispatchMode::Thread && !self.on_dispatch_thread();
        let (reply, rx) = bounded(1);
        if !self.submit(Op::Flush {
            reply,
            through_dispatch,
        }) {
            return Err(TrackerError::disconnected("worker"));
        }
        wait_reply(&rx, &self.shared.config, "worker")?;

        if self.shared.config.dispatch_mode == DispatchMode::Host {
            self.run_pending();
        }
        Ok(())
    }

    /// Wait until the worker processed everything submitted before this call.
    ///
    /// Resulting callbacks may still be pending on the dispatch context.
    pub fn wait_for_worker(&self) -> TrackerResult<()> {
        let (reply, rx) = bounded(1);
        if !self.submit(Op::Flush {
            reply,
            through_dispatch: false,
        }) {
            return Err(TrackerError::disconnected("worker"));
        }
        wait_reply(&rx, &self.shared.config, "worker")
    }

    /// Drain and run pending dispatches on the calling thread (`Host` mode).
    ///
    /// Returns the number of dispatch messages handled. Returns 0 in `Thread`
    /// mode, and when called re-entrantly or while another thread is draining.
    pub fn run_pending(&self) -> usize {
        if self.shared.config.dispatch_mode != DispatchMode::Host {
            return 0;
        }
        if !self.shared.host.try_enter() {
            return 0;
        }

        let mut handled = 0;
        while let Ok(msg) = self.shared.dispatch_rx.try_recv() {
            dispatcher::handle_message(msg, self);
            handled += 1;
        }

        self.shared.host.leave();
        handled
    }

    /// Point-in-time copy of the tracker counters.
    #[must_use]
    pub fn stats(&self) -> TrackerStats {
        self.shared.counters.snapshot()
    }

    /// True once `shutdown` has started.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

/// Owner of a running tracker.
///
/// Construct once at startup and hand out `handle()` clones. Dropping the
/// tracker shuts it down after all accepted operations were processed.
#[derive(Debug)]
pub struct EventTracker {
    handle: TrackerHandle,
    worker: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl EventTracker {
    /// Validate `config`, then start the worker (and, in `Thread` mode, the dispatch thread).
    pub fn new(config: TrackerConfig) -> TrackerResult<Self> {
        config.validate()?;

        let (ops_tx, ops_rx) = unbounded::<Op>();
        let (dispatch_tx, dispatch_rx) = unbounded::<DispatchMsg>();

        let shared = Arc::new(Shared {
            config: config.clone(),
            store: EventStore::new(),
            registry: ExecutionRegistry::new(),
            counters: Counters::default(),
            ops_tx,
            dispatch_tx,
            dispatch_rx: dispatch_rx.clone(),
            dispatch_thread: OnceLock::new(),
            host: HostContext::default(),
            accepted: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });
        let handle = TrackerHandle { shared };

        let worker_shared = Arc::clone(&handle.shared);
        let worker = thread::Builder::new()
            .name(config.worker_thread_name.clone())
            .spawn(move || processor::worker_loop(worker_shared, ops_rx))
            .map_err(|e| ExecutionError::Spawn {
                thread: config.worker_thread_name.clone(),
                message: e.to_string(),
            })?;

        let mut tracker = Self {
            handle,
            worker: Some(worker),
            dispatcher: None,
        };

        if config.dispatch_mode == DispatchMode::Thread {
            let dispatch_handle = tracker.handle.clone();
            let spawned = thread::Builder::new()
                .name(config.dispatcher_thread_name.clone())
                .spawn(move || dispatcher::dispatch_loop(dispatch_handle, dispatch_rx));
            match spawned {
                Ok(join) => tracker.dispatcher = Some(join),
                Err(e) => {
                    tracker.shutdown();
                    return Err(ExecutionError::Spawn {
                        thread: config.dispatcher_thread_name,
                        message: e.to_string(),
                    }
                    .into());
                }
            }
        }

        info!(mode = ?config.dispatch_mode, "event tracker started");
        Ok(tracker)
    }

    /// Start a tracker with the default configuration.
    pub fn with_defaults() -> TrackerResult<Self> {
        Self::new(TrackerConfig::default())
    }

    /// A cloneable handle for consumers.
    #[must_use]
    pub fn handle(&self) -> TrackerHandle {
        self.handle.clone()
    }

    /// Process everything already accepted, then stop both threads. Idempotent.
    ///
    /// Before closing, the tracker flushes until a round produces no new
    /// submissions, so mutations issued by callbacks of accepted work are still
    /// applied. A chain that keeps submitting past `flush_timeout` is cut off:
    /// later submissions are rejected and counted. In `Host` mode the final
    /// flushes run pending callbacks on the calling thread.
    pub fn shutdown(&mut self) {
        // Without a dispatch thread (failed spawn) a through-dispatch flush
        // would only time out.
        let can_drain = self.worker.is_some()
            && (self.dispatcher.is_some() || self.handle.config().dispatch_mode == DispatchMode::Host);
        if can_drain && !self.handle.is_shut_down() {
            self.drain_until_quiet();
        }

        let shared = &self.handle.shared;
        if !shared.closed.swap(true, Ordering::AcqRel) {
            let _ = shared.ops_tx.send(Op::Shutdown);
        }

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            // Dropped from inside a callback: the dispatch thread exits on its own.
            if dispatcher.thread().id() != thread::current().id() {
                let _ = dispatcher.join();
            }
        }
        info!("event tracker shut down");
    }

    fn drain_until_quiet(&self) {
        let shared = &self.handle.shared;
        let deadline = Instant::now() + shared.config.flush_timeout();
        loop {
            let before = shared.accepted.load(Ordering::Acquire);
            if let Err(err) = self.handle.flush() {
                warn!(error = %err, "final flush failed");
                return;
            }
            // The flush itself is one accepted submission.
            if shared.accepted.load(Ordering::Acquire) == before + 1 {
                return;
            }
            if Instant::now() >= deadline {
                warn!("callbacks still submitting at shutdown; closing anyway");
                return;
            }
        }
    }
}

impl Deref for EventTracker {
    type Target = TrackerHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for EventTracker {
    fn drop(&mut self) {
        if self.worker.is_some() || self.dispatcher.is_some() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn host_tracker() -> EventTracker {
        EventTracker::new(TrackerConfig::host()).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = TrackerConfig {
            flush_timeout_ms: 0,
            ..TrackerConfig::default()
        };
        let err = EventTracker::new(cfg).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn host_mode_defers_callbacks_until_run_pending() {
        let tracker = host_tracker();
        tracker.register_event("ready", false, EventScope::Instance).unwrap();

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        tracker.add_execution_block(
            ExecutionSpec::new("on-ready", ["ready"], move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .keep_alive(true),
        );

        tracker.set_event("ready", true);
        // Nothing has been drained yet.
        tracker.wait_for_worker().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        assert_eq!(tracker.run_pending(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.run_pending(), 0);
    }

    #[test]
    fn run_pending_is_noop_in_thread_mode() {
        let tracker = EventTracker::with_defaults().unwrap();
        assert_eq!(tracker.run_pending(), 0);
    }

    #[test]
    fn submissions_after_shutdown_are_rejected() {
        let mut tracker = host_tracker();
        let handle = tracker.handle();
        tracker.shutdown();

        assert!(handle.is_shut_down());
        handle.trigger_event("anything");
        assert_eq!(handle.stats().rejected_submissions, 1);
        assert!(handle.register_event("x", 0, EventScope::App).unwrap_err().is_disconnected());
        assert!(handle.flush().unwrap_err().is_disconnected());
    }

    #[test]
    fn shutdown_drains_accepted_work() {
        let mut tracker = host_tracker();
        tracker.register_event("count", 0, EventScope::Session).unwrap();
        for _ in 0..50 {
            tracker.trigger_event("count");
        }
        tracker.shutdown();
        assert_eq!(tracker.integer_value_for_event("count"), 50);
    }

    #[test]
    fn add_and_run_without_events_is_skipped() {
        let tracker = host_tracker();
        let outcome = tracker
            .add_and_run_execution_block(ExecutionSpec::new("lonely", Vec::<String>::new(), |_, _| {}))
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Skipped);
        assert_eq!(tracker.execution_objects().len(), 1);
    }
}
