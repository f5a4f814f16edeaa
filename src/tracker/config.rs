use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Where validation and execution callbacks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// A dedicated dispatch thread owned by the tracker.
    #[default]
    Thread,
    /// The host's own loop drains dispatches with `EventTracker::run_pending`.
    Host,
}

/// Tracker configuration.
///
/// Deserializable so hosts can keep it next to their other settings; missing
/// fields take their defaults.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub dispatch_mode: DispatchMode,
    /// Name of the serialized trigger worker thread.
    pub worker_thread_name: String,
    /// Name of the dispatch thread (unused in `Host` mode).
    pub dispatcher_thread_name: String,
    /// Upper bound for calls that wait on the worker or the dispatch context.
    pub flush_timeout_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            dispatch_mode: DispatchMode::Thread,
            worker_thread_name: "eventstate-worker".to_string(),
            dispatcher_thread_name: "eventstate-dispatch".to_string(),
            flush_timeout_ms: 5_000,
        }
    }
}

impl TrackerConfig {
    /// Default configuration with callbacks drained by the host loop.
    #[must_use]
    pub fn host() -> Self {
        Self {
            dispatch_mode: DispatchMode::Host,
            ..Self::default()
        }
    }

    /// `flush_timeout_ms` as a `Duration`.
    #[must_use]
    pub const fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    /// Reject empty thread names and a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_thread_name.trim().is_empty() {
            return Err(ConfigError::EmptyThreadName {
                field: "worker_thread_name".to_string(),
            });
        }
        if self.dispatch_mode == DispatchMode::Thread && self.dispatcher_thread_name.trim().is_empty() {
            return Err(ConfigError::EmptyThreadName {
                field: "dispatcher_thread_name".to_string(),
            });
        }
        if self.flush_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "flush_timeout_ms".to_string(),
            });
        }
        Ok(())
    }
}
