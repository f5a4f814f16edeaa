//! Serialized trigger worker.
//!
//! Every store mutation and every registry lookup on behalf of a trigger runs
//! here, one operation at a time in submission order. Matching candidates are
//! handed to the dispatch context without waiting for their callbacks.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::scope::EventScope;
use crate::store::{EventSnapshot, Increment};
use crate::value::Value;

use super::dispatcher::DispatchMsg;
use super::stats::Counters;
use super::Shared;

#[derive(Debug)]
pub(crate) enum Op {
    Register {
        event: String,
        initial_value: Value,
        scope: EventScope,
        reply: Sender<()>,
    },
    Trigger {
        event: String,
    },
    Set {
        event: String,
        value: Value,
    },
    Reset {
        event: String,
    },
    ResetScopes {
        scopes: Option<Vec<EventScope>>,
        reason: &'static str,
    },
    Restore {
        snapshots: Vec<EventSnapshot>,
        reply: Sender<usize>,
    },
    Flush {
        reply: Sender<()>,
        through_dispatch: bool,
    },
    Shutdown,
}

pub(crate) fn worker_loop(shared: Arc<Shared>, ops_rx: Receiver<Op>) {
    for op in ops_rx.iter() {
        match op {
            Op::Register {
                event,
                initial_value,
                scope,
                reply,
            } => {
                let replaced = shared.store.register(&event, initial_value, scope);
                debug!(event = %event, ?scope, replaced, "event registered");
                let _ = reply.send(());
            }
            Op::Trigger { event } => match shared.store.increment_if_numeric(&event) {
                Increment::Incremented => route(&shared, event),
                Increment::Unregistered => ignore(&shared, &event, "unregistered"),
                Increment::NotNumeric => ignore(&shared, &event, "not_numeric"),
            },
            Op::Set { event, value } => {
                if shared.store.set_value(&event, value) {
                    route(&shared, event);
                } else {
                    ignore(&shared, &event, "unregistered");
                }
            }
            Op::Reset { event } => {
                let reset = shared.store.reset_one(&event);
                debug!(event = %event, reset, "event reset");
            }
            Op::ResetScopes { scopes, reason } => {
                let count = shared.store.reset_all(scopes.as_deref());
                debug!(reason, count, "events reset");
            }
            Op::Restore { snapshots, reply } => {
                let applied = shared.store.restore(&snapshots);
                debug!(offered = snapshots.len(), applied, "event values restored");
                let _ = reply.send(applied);
            }
            Op::Flush {
                reply,
                through_dispatch,
            } => {
                if through_dispatch {
                    if let Err(err) = shared.dispatch_tx.send(DispatchMsg::Flush { reply }) {
                        if let DispatchMsg::Flush { reply } = err.into_inner() {
                            let _ = reply.send(());
                        }
                    }
                } else {
                    let _ = reply.send(());
                }
            }
            Op::Shutdown => {
                let _ = shared.dispatch_tx.send(DispatchMsg::Shutdown);
                break;
            }
        }
    }

    info!("trigger worker stopped");
}

fn ignore(shared: &Shared, event: &str, reason: &'static str) {
    Counters::bump(&shared.counters.triggers_ignored);
    debug!(event = %event, reason, "mutation ignored");
}

/// Hand every live listener of `event` to the dispatch context.
fn route(shared: &Shared, event: String) {
    Counters::bump(&shared.counters.triggers_processed);

    let candidates = shared.registry.interested_in(&event);
    debug!(event = %event, candidates = candidates.len(), "trigger accepted");
    if candidates.is_empty() {
        return;
    }

    Counters::bump(&shared.counters.dispatch_batches);
    if shared
        .dispatch_tx
        .send(DispatchMsg::Evaluate { event, candidates })
        .is_err()
    {
        warn!("dispatch context is gone; dropping candidate batch");
    }
}
