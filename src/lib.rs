//! # eventstate - in-process event-state tracking
//!
//! eventstate keeps a registry of named, scoped event values and runs
//! dependent callbacks when a caller-supplied validation over those values
//! becomes true.
//!
//! ## Core Concepts
//!
//! - **Event**: a named value with an initial value and a lifetime scope
//! - **Scope**: `Instance` (cleared on background), `Session` (cleared on restart),
//!   `App` (cleared on logout)
//! - **Execution**: a validation + execution callback pair listening to events,
//!   either one-shot or kept alive
//! - **Trigger**: a change notification that re-evaluates interested executions
//!
//! Mutations run on one serialized worker thread; callbacks run on one
//! designated dispatch context (a tracker-owned thread, or the host's loop).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use eventstate::{EventScope, EventTracker, ExecutionSpec};
//!
//! let tracker = EventTracker::with_defaults()?;
//! tracker.register_event("map_displayed", 0, EventScope::Session)?;
//!
//! tracker.add_execution_block(
//!     ExecutionSpec::new("show-tip", ["map_displayed"], |_, _| println!("tip!"))
//!         .when(|_, t| t.integer_value_for_event("map_displayed") >= 3),
//! );
//!
//! for _ in 0..3 {
//!     tracker.trigger_event("map_displayed");
//! }
//! tracker.flush()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod execution;
pub mod scope;
pub mod store;
pub mod tracker;
pub mod value;

// Re-export primary types at crate root for convenience
pub use error::{ConfigError, ExecutionError, TrackerError, TrackerResult};
pub use execution::{ExecutionBlock, ExecutionObject, ExecutionRegistry, ExecutionSpec, ValidationBlock};
pub use scope::{EventScope, LifecycleTransition};
pub use store::{EventRecord, EventSnapshot, EventStore, Increment};
pub use tracker::{DispatchMode, DispatchOutcome, EventTracker, TrackerConfig, TrackerHandle, TrackerStats};
pub use value::Value;
