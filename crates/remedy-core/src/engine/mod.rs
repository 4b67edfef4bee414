//! Step execution engine and its read models.

pub mod executor;
pub mod status;

pub use executor::StepExecutionEngine;
pub use status::{AssignmentResult, StatusProjection, StepStatus, StepView};
