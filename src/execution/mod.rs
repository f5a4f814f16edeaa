//! Execution objects and their registry.

/// Execution objects, callback types and the registration builder.
pub mod object;
/// Ordered, ID-keyed collection of execution objects.
pub mod registry;

pub use object::{ExecutionBlock, ExecutionObject, ExecutionSpec, ValidationBlock};
pub use registry::ExecutionRegistry;
