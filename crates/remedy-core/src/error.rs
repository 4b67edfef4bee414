//! Error types for Remedy Core.

use std::fmt;

use thiserror::Error;

use crate::storage::StorageError;

/// Errors returned by the step execution engine.
///
/// Validation failures are reported synchronously and never retried.
/// Storage failures propagate unchanged so the caller owns retry policy.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Exception missing, or owned by another tenant.
    #[error("Exception not found: {0}")]
    NotFound(String),

    /// Exception has no playbook assigned.
    #[error("No playbook assigned to exception {0}")]
    NoPlaybookAssigned(String),

    /// Requested step is not the exception's current step.
    #[error("Step is not the next expected step: {0}")]
    NotNextExpectedStep(String),

    /// Step order below 1.
    #[error("Invalid step order {0}: step orders start at 1")]
    InvalidStepOrder(i64),

    /// Actor type is not one of human, agent or system.
    #[error("Invalid actor type '{0}': expected human, agent or system")]
    InvalidActorType(String),

    /// A risky step was submitted by a non-human actor.
    #[error("Step {step_order} ({action_type}) requires human approval")]
    RequiresHumanApproval {
        /// The rejected step.
        step_order: i64,
        /// Its action type.
        action_type: String,
    },

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Discriminant of an [`EngineError`], for mapping errors to transport codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    NoPlaybookAssigned,
    NotNextExpectedStep,
    InvalidStepOrder,
    InvalidActorType,
    RequiresHumanApproval,
    Storage,
}

impl ErrorKind {
    /// Returns the kind's stable name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::NoPlaybookAssigned => "NoPlaybookAssigned",
            Self::NotNextExpectedStep => "NotNextExpectedStep",
            Self::InvalidStepOrder => "InvalidStepOrder",
            Self::InvalidActorType => "InvalidActorType",
            Self::RequiresHumanApproval => "RequiresHumanApproval",
            Self::Storage => "Storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EngineError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NoPlaybookAssigned(_) => ErrorKind::NoPlaybookAssigned,
            Self::NotNextExpectedStep(_) => ErrorKind::NotNextExpectedStep,
            Self::InvalidStepOrder(_) => ErrorKind::InvalidStepOrder,
            Self::InvalidActorType(_) => ErrorKind::InvalidActorType,
            Self::RequiresHumanApproval { .. } => ErrorKind::RequiresHumanApproval,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
