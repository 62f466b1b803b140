//! Operator-facing tasks: a static registry of parameter schemas plus the
//! entry points that run them.

pub mod registry;
pub mod top_customers;

pub use registry::{ParamKind, ParamSpec, TaskArgs, TaskDescriptor, TaskOutcome, TaskRegistry};
