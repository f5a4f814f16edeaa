//! Error types for eventstate.
//!
//! Operations on unregistered event names are never errors: mutators are
//! no-ops and readers return defaults. Errors only surface from construction
//! and from calls that wait on the worker or the dispatch context.

use thiserror::Error;

/// Configuration errors reported by `TrackerConfig::validate`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Thread name for '{field}' cannot be empty")]
    EmptyThreadName {
        field: String,
    },

    #[error("Field '{field}' must be greater than zero")]
    ZeroDuration {
        field: String,
    },
}

/// Errors raised while talking to the worker or the dispatch context.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },

    #[error("Failed to spawn thread '{thread}': {message}")]
    Spawn {
        thread: String,
        message: String,
    },
}

/// Top-level error type for eventstate.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl TrackerError {
    pub(crate) fn disconnected(path: &str) -> Self {
        Self::Execution(ExecutionError::Disconnected {
            path: path.to_string(),
        })
    }

    pub(crate) fn timeout(duration: std::time::Duration) -> Self {
        Self::Execution(ExecutionError::Timeout {
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if the tracker has been shut down or one of its threads is gone.
    #[must_use]
    pub const fn is_disconnected(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::Disconnected { .. }))
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Execution(e) => matches!(e, ExecutionError::Timeout { .. }),
        }
    }
}

/// Result type alias for eventstate operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::EmptyThreadName {
            field: "worker_thread_name".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("worker_thread_name"));
        assert!(msg.contains("empty"));
    }

    #[test]
    fn test_timeout_conversion() {
        let err = TrackerError::timeout(Duration::from_millis(250));
        assert!(err.is_execution());
        assert!(err.is_retryable());
        assert!(format!("{err}").contains("250ms"));
    }

    #[test]
    fn test_disconnected_is_not_retryable() {
        let err = TrackerError::disconnected("worker");
        assert!(err.is_disconnected());
        assert!(!err.is_retryable());
        assert!(format!("{err}").contains("worker"));
    }

    #[test]
    fn test_from_config_error() {
        let err: TrackerError = ConfigError::ZeroDuration {
            field: "flush_timeout_ms".to_string(),
        }
        .into();
        assert!(err.is_config());
        assert!(!err.is_retryable());
    }
}
