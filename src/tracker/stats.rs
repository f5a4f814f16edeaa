use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters, updated with relaxed atomics.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub triggers_processed: AtomicU64,
    pub triggers_ignored: AtomicU64,
    pub dispatch_batches: AtomicU64,
    pub executions_run: AtomicU64,
    pub validations_failed: AtomicU64,
    pub candidates_skipped: AtomicU64,
    pub callback_panics: AtomicU64,
    pub rejected_submissions: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TrackerStats {
        TrackerStats {
            triggers_processed: self.triggers_processed.load(Ordering::Relaxed),
            triggers_ignored: self.triggers_ignored.load(Ordering::Relaxed),
            dispatch_batches: self.dispatch_batches.load(Ordering::Relaxed),
            executions_run: self.executions_run.load(Ordering::Relaxed),
            validations_failed: self.validations_failed.load(Ordering::Relaxed),
            candidates_skipped: self.candidates_skipped.load(Ordering::Relaxed),
            callback_panics: self.callback_panics.load(Ordering::Relaxed),
            rejected_submissions: self.rejected_submissions.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the tracker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TrackerStats {
    /// Triggers and sets applied to a registered event.
    pub triggers_processed: u64,
    /// Triggers and sets dropped: unregistered event, or a bare trigger on a non-numeric value.
    pub triggers_ignored: u64,
    /// Candidate batches handed to the dispatch context.
    pub dispatch_batches: u64,
    /// Execution callbacks started.
    pub executions_run: u64,
    /// Validations that returned false (or panicked).
    pub validations_failed: u64,
    /// Candidates skipped because they were already consumed or retired.
    pub candidates_skipped: u64,
    /// Validation or execution callbacks that panicked.
    pub callback_panics: u64,
    /// Operations submitted after shutdown.
    pub rejected_submissions: u64,
}
