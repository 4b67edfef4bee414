//! Results returned by the step execution engine.

use serde::{Deserialize, Serialize};

use crate::models::{ActionType, MatchConditions, Playbook, PlaybookPointer, PlaybookStep};

/// Status of a playbook step for one exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Step has not been completed yet.
    Pending,
    /// Step was completed.
    Completed,
}

/// A playbook step as seen from an exception.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepView {
    pub step_id: String,
    pub step_order: i64,
    pub name: String,
    pub action_type: ActionType,
    pub params: serde_json::Value,
    pub status: StepStatus,
}

/// Outcome of `recalculate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub exception_id: String,
    /// Assigned playbook, `None` when nothing matched.
    pub playbook_id: Option<i64>,
    /// `Some(1)` after a match, `None` otherwise.
    pub current_step: Option<i64>,
    /// Why the playbook was (or was not) selected.
    pub reasoning: String,
}

impl AssignmentResult {
    /// Returns the resulting pointer.
    pub fn pointer(&self) -> PlaybookPointer {
        PlaybookPointer { playbook_id: self.playbook_id, current_step: self.current_step }
    }
}

/// Read model of an exception's progress through its playbook.
///
/// When the assigned playbook can no longer be loaded, `playbook_id` stays
/// populated while the playbook fields are `None` and `steps` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusProjection {
    pub exception_id: String,
    pub playbook_id: Option<i64>,
    pub playbook_name: Option<String>,
    pub playbook_version: Option<i32>,
    pub conditions: Option<MatchConditions>,
    pub priority: Option<i64>,
    pub current_step: Option<i64>,
    pub total_steps: usize,
    /// True once every step of the assigned playbook is completed.
    pub is_completed: bool,
    pub steps: Vec<StepView>,
}

impl StatusProjection {
    /// Projection of an exception with no playbook.
    pub fn unassigned(exception_id: impl Into<String>) -> Self {
        Self {
            exception_id: exception_id.into(),
            playbook_id: None,
            playbook_name: None,
            playbook_version: None,
            conditions: None,
            priority: None,
            current_step: None,
            total_steps: 0,
            is_completed: false,
            steps: Vec::new(),
        }
    }

    /// Builds the projection for `pointer`.
    ///
    /// `playbook` is `None` when the assigned definition is gone; `steps`
    /// must be sorted by order.
    pub fn build(
        exception_id: impl Into<String>,
        pointer: PlaybookPointer,
        playbook: Option<&Playbook>,
        steps: &[PlaybookStep],
    ) -> Self {
        let Some(playbook_id) = pointer.playbook_id else {
            return Self::unassigned(exception_id);
        };
        let is_completed = pointer.current_step.is_none();

        let Some(playbook) = playbook else {
            return Self {
                playbook_id: Some(playbook_id),
                current_step: pointer.current_step,
                is_completed,
                ..Self::unassigned(exception_id)
            };
        };

        let steps: Vec<StepView> = steps
            .iter()
            .map(|step| {
                let done = match pointer.current_step {
                    Some(current) => step.step_order < current,
                    None => true,
                };
                StepView {
                    step_id: step.step_id.clone(),
                    step_order: step.step_order,
                    name: step.name.clone(),
                    action_type: step.action_type.clone(),
                    params: step.params.clone(),
                    status: if done { StepStatus::Completed } else { StepStatus::Pending },
                }
            })
            .collect();

        Self {
            exception_id: exception_id.into(),
            playbook_id: Some(playbook_id),
            playbook_name: Some(playbook.name.clone()),
            playbook_version: Some(playbook.version),
            conditions: Some(playbook.conditions.clone()),
            priority: Some(playbook.priority),
            current_step: pointer.current_step,
            total_steps: steps.len(),
            is_completed,
            steps,
        }
    }

    /// Returns the step the exception is currently at.
    pub fn current(&self) -> Option<&StepView> {
        let current = self.current_step?;
        self.steps.iter().find(|s| s.step_order == current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playbook() -> (Playbook, Vec<PlaybookStep>) {
        let playbook = Playbook::new("tenant-a", 1, "Payment failure", 3).with_priority(100);
        let steps = vec![
            PlaybookStep::new(1, 1, "Notify", ActionType::Notify),
            PlaybookStep::new(1, 2, "Retry", ActionType::CallTool),
            PlaybookStep::new(1, 3, "Close", ActionType::SetStatus),
        ];
        (playbook, steps)
    }

    fn statuses(projection: &StatusProjection) -> Vec<StepStatus> {
        projection.steps.iter().map(|s| s.status).collect()
    }

    #[test]
    fn test_unassigned_projection() {
        let projection =
            StatusProjection::build("exc-1", PlaybookPointer::unassigned(), None, &[]);
        assert_eq!(projection, StatusProjection::unassigned("exc-1"));
        assert!(!projection.is_completed);
    }

    #[test]
    fn test_active_projection_marks_earlier_steps_completed() {
        let (playbook, steps) = playbook();
        let projection =
            StatusProjection::build("exc-1", PlaybookPointer::active(1, 2), Some(&playbook), &steps);

        assert_eq!(projection.playbook_name.as_deref(), Some("Payment failure"));
        assert_eq!(projection.playbook_version, Some(3));
        assert_eq!(projection.priority, Some(100));
        assert_eq!(projection.total_steps, 3);
        assert_eq!(
            statuses(&projection),
            vec![StepStatus::Completed, StepStatus::Pending, StepStatus::Pending]
        );
        assert_eq!(projection.current().map(|s| s.name.as_str()), Some("Retry"));
    }

    #[test]
    fn test_completed_projection() {
        let (playbook, steps) = playbook();
        let projection =
            StatusProjection::build("exc-1", PlaybookPointer::completed(1), Some(&playbook), &steps);

        assert!(projection.is_completed);
        assert!(projection.current().is_none());
        assert!(statuses(&projection).iter().all(|s| *s == StepStatus::Completed));
    }

    #[test]
    fn test_deleted_playbook_projection() {
        let projection = StatusProjection::build("exc-1", PlaybookPointer::active(9, 2), None, &[]);
        assert_eq!(projection.playbook_id, Some(9));
        assert_eq!(projection.current_step, Some(2));
        assert!(projection.playbook_name.is_none());
        assert!(projection.steps.is_empty());
    }

    #[test]
    fn test_step_status_serialization() {
        assert_eq!(serde_json::to_value(StepStatus::Completed).unwrap(), "completed");
    }
}
