//! Callback dispatch.
//!
//! All validation and execution callbacks run on one designated context: the
//! dispatch thread, or the host loop calling `run_pending`. Candidates are
//! evaluated in the order the worker produced them.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, trace};

use crate::execution::ExecutionObject;

use super::stats::Counters;
use super::TrackerHandle;

/// Result of evaluating one execution object for one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Validation passed and the execution callback ran.
    Executed,
    /// Validation returned false; the object is untouched.
    NotValidated,
    /// The object was already consumed, replaced or removed, or listens to nothing.
    Skipped,
}

#[derive(Debug)]
pub(crate) enum DispatchMsg {
    Evaluate {
        event: String,
        candidates: Vec<Arc<ExecutionObject>>,
    },
    Immediate {
        event: String,
        object: Arc<ExecutionObject>,
        reply: Sender<DispatchOutcome>,
    },
    Flush {
        reply: Sender<()>,
    },
    Shutdown,
}

/// Evaluate `object` for `event` and run it if validation passes.
///
/// One-shot objects are claimed before their execution callback starts, so a
/// trigger fired from inside that callback, or a second batch already queued
/// behind this one, cannot run them again.
pub(crate) fn evaluate(object: &Arc<ExecutionObject>, event: &str, tracker: &TrackerHandle) -> DispatchOutcome {
    let counters = &tracker.shared.counters;
    let execution_id = object.execution_id();

    if object.is_marked_for_deletion() {
        Counters::bump(&counters.candidates_skipped);
        trace!(execution_id, event, "skipping retired execution");
        return DispatchOutcome::Skipped;
    }

    let validated = match catch_unwind(AssertUnwindSafe(|| object.validate(event, tracker))) {
        Ok(validated) => validated,
        Err(_) => {
            Counters::bump(&counters.callback_panics);
            error!(execution_id, event, "validation callback panicked");
            false
        }
    };
    if !validated {
        Counters::bump(&counters.validations_failed);
        trace!(execution_id, event, "validation failed");
        return DispatchOutcome::NotValidated;
    }

    if object.keep_alive() {
        if object.is_marked_for_deletion() {
            Counters::bump(&counters.candidates_skipped);
            return DispatchOutcome::Skipped;
        }
        run(object, event, tracker);
        return DispatchOutcome::Executed;
    }

    if !object.claim() {
        Counters::bump(&counters.candidates_skipped);
        trace!(execution_id, event, "execution already claimed");
        return DispatchOutcome::Skipped;
    }
    run(object, event, tracker);
    tracker.shared.registry.remove_object(object);
    DispatchOutcome::Executed
}

fn run(object: &ExecutionObject, event: &str, tracker: &TrackerHandle) {
    Counters::bump(&tracker.shared.counters.executions_run);
    trace!(execution_id = object.execution_id(), event, "running execution");
    if catch_unwind(AssertUnwindSafe(|| object.execute(event, tracker))).is_err() {
        Counters::bump(&tracker.shared.counters.callback_panics);
        error!(
            execution_id = object.execution_id(),
            event, "execution callback panicked"
        );
    }
}

/// Handle one message. Returns false on shutdown.
pub(crate) fn handle_message(msg: DispatchMsg, tracker: &TrackerHandle) -> bool {
    match msg {
        DispatchMsg::Evaluate { event, candidates } => {
            for object in &candidates {
                evaluate(object, &event, tracker);
            }
            true
        }
        DispatchMsg::Immediate { event, object, reply } => {
            let outcome = evaluate(&object, &event, tracker);
            let _ = reply.send(outcome);
            true
        }
        DispatchMsg::Flush { reply } => {
            let _ = reply.send(());
            true
        }
        DispatchMsg::Shutdown => false,
    }
}

pub(crate) fn dispatch_loop(tracker: TrackerHandle, rx: Receiver<DispatchMsg>) {
    // Recorded before the first callback can run.
    let _ = tracker.shared.dispatch_thread.set(thread::current().id());

    for msg in rx.iter() {
        if !handle_message(msg, &tracker) {
            break;
        }
    }

    info!("dispatch thread stopped");
}
