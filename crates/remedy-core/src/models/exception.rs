//! Exception records and their playbook pointer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification fields produced by triage.
///
/// Any field may be absent while the exception is still unclassified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Business domain (e.g. `Finance`).
    pub domain: Option<String>,
    /// Exception type within the domain (e.g. `PaymentFailure`).
    pub exception_type: Option<String>,
    /// Severity label (e.g. `HIGH`).
    pub severity: Option<String>,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "domain={}, exception_type={}, severity={}",
            self.domain.as_deref().unwrap_or("<none>"),
            self.exception_type.as_deref().unwrap_or("<none>"),
            self.severity.as_deref().unwrap_or("<none>"),
        )
    }
}

/// Position of an exception in its assigned playbook.
///
/// `current_step == None` with a playbook assigned means every step of that
/// playbook is completed, never "not started".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookPointer {
    /// Assigned playbook, if any.
    pub playbook_id: Option<i64>,
    /// Next step to complete (1-based).
    pub current_step: Option<i64>,
}

/// State machine view of a [`PlaybookPointer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerState {
    /// No playbook assigned.
    Unassigned,
    /// Playbook assigned and `step` is the next step to complete.
    Active {
        /// Assigned playbook.
        playbook_id: i64,
        /// Next step.
        step: i64,
    },
    /// Every step of the assigned playbook has been completed.
    Completed {
        /// Assigned playbook.
        playbook_id: i64,
    },
}

impl PlaybookPointer {
    /// Pointer with no playbook assigned.
    pub fn unassigned() -> Self {
        Self::default()
    }

    /// Pointer at `step` of `playbook_id`.
    pub fn active(playbook_id: i64, step: i64) -> Self {
        Self { playbook_id: Some(playbook_id), current_step: Some(step) }
    }

    /// Pointer past the last step of `playbook_id`.
    pub fn completed(playbook_id: i64) -> Self {
        Self { playbook_id: Some(playbook_id), current_step: None }
    }

    /// Builds a pointer from stored columns, rejecting a step without a playbook.
    pub fn from_parts(playbook_id: Option<i64>, current_step: Option<i64>) -> Option<Self> {
        match (playbook_id, current_step) {
            (None, Some(_)) => None,
            _ => Some(Self { playbook_id, current_step }),
        }
    }

    /// Returns the state machine view of this pointer.
    pub fn state(&self) -> PointerState {
        match (self.playbook_id, self.current_step) {
            (None, _) => PointerState::Unassigned,
            (Some(playbook_id), Some(step)) => PointerState::Active { playbook_id, step },
            (Some(playbook_id), None) => PointerState::Completed { playbook_id },
        }
    }
}

impl fmt::Display for PlaybookPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state() {
            PointerState::Unassigned => write!(f, "unassigned"),
            PointerState::Active { playbook_id, step } => {
                write!(f, "playbook {} at step {}", playbook_id, step)
            }
            PointerState::Completed { playbook_id } => {
                write!(f, "playbook {} completed", playbook_id)
            }
        }
    }
}

/// A tenant-scoped business incident under remediation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exception {
    /// Owning tenant.
    pub tenant_id: String,
    /// Identifier, unique within the tenant.
    pub exception_id: String,
    /// Current classification.
    pub classification: Classification,
    /// Playbook pointer.
    pub pointer: PlaybookPointer,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Exception {
    /// Creates an unassigned exception with the given classification.
    pub fn new(
        tenant_id: impl Into<String>,
        exception_id: impl Into<String>,
        classification: Classification,
    ) -> Self {
        let now = Utc::now();
        Self {
            tenant_id: tenant_id.into(),
            exception_id: exception_id.into(),
            classification,
            pointer: PlaybookPointer::unassigned(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_states() {
        assert_eq!(PlaybookPointer::unassigned().state(), PointerState::Unassigned);
        assert_eq!(
            PlaybookPointer::active(7, 2).state(),
            PointerState::Active { playbook_id: 7, step: 2 }
        );
        assert_eq!(PlaybookPointer::completed(7).state(), PointerState::Completed { playbook_id: 7 });
    }

    #[test]
    fn test_pointer_from_parts_rejects_orphan_step() {
        assert!(PlaybookPointer::from_parts(None, Some(1)).is_none());
        assert_eq!(PlaybookPointer::from_parts(Some(3), None), Some(PlaybookPointer::completed(3)));
        assert_eq!(PlaybookPointer::from_parts(None, None), Some(PlaybookPointer::unassigned()));
    }

    #[test]
    fn test_pointer_display() {
        assert_eq!(PlaybookPointer::active(1, 3).to_string(), "playbook 1 at step 3");
        assert_eq!(PlaybookPointer::completed(1).to_string(), "playbook 1 completed");
    }

    #[test]
    fn test_new_exception_is_unassigned() {
        let exception = Exception::new("tenant-a", "exc-1", Classification::default());
        assert_eq!(exception.pointer.state(), PointerState::Unassigned);
        assert_eq!(exception.created_at, exception.updated_at);
    }
}
