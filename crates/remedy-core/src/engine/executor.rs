//! Step execution engine.
//!
//! Drives an exception's playbook pointer through its state machine:
//!
//! ```text
//! Unassigned --recalculate(match)--> Active(p, 1)
//! Active(p, n) --complete_step(n)--> Active(p, n + 1) | Completed(p)
//! any --recalculate(match)--> Active(p', 1)
//! any --recalculate(no match)--> Unassigned
//! ```
//!
//! Every pointer write is guarded by the pointer read at validation time, so
//! a concurrent writer on the same exception makes the loser fail with
//! `NotNextExpectedStep` instead of double-advancing. The events describing a
//! transition are committed together with the pointer move.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::engine::status::{AssignmentResult, StatusProjection};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    ActorType, EventRecord, EventType, Exception, NewEvent, PlaybookPointer, PlaybookStep,
    PointerState,
};
use crate::playbooks::PlaybookMatcher;
use crate::storage::{
    EventLog, ExceptionStore, PlaybookStepStore, PlaybookStore, RemediationStore, StorageError,
};

/// Orchestrates playbook assignment and step completion.
///
/// Holds no per-exception state; every operation is a short read-modify-write
/// against the injected collaborators.
pub struct StepExecutionEngine {
    exceptions: Arc<dyn ExceptionStore>,
    playbooks: Arc<dyn PlaybookStore>,
    steps: Arc<dyn PlaybookStepStore>,
    events: Arc<dyn EventLog>,
    matcher: PlaybookMatcher,
    config: EngineConfig,
}

impl StepExecutionEngine {
    /// Creates an engine over the given collaborators.
    pub fn new(
        exceptions: Arc<dyn ExceptionStore>,
        playbooks: Arc<dyn PlaybookStore>,
        steps: Arc<dyn PlaybookStepStore>,
        events: Arc<dyn EventLog>,
        config: EngineConfig,
    ) -> Self {
        let matcher = PlaybookMatcher::new(Arc::clone(&playbooks));
        Self { exceptions, playbooks, steps, events, matcher, config }
    }

    /// Creates an engine over a single store providing every collaborator.
    pub fn with_store<S>(store: Arc<S>, config: EngineConfig) -> Self
    where
        S: RemediationStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store.clone(), store, config)
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Re-runs playbook matching and restarts the exception at step 1.
    ///
    /// The step pointer is reset even when the matched playbook is the one
    /// already assigned. A non-match clears the pointer without emitting an
    /// event.
    ///
    /// # Errors
    ///
    /// * `EngineError::NotFound` - missing or foreign exception
    /// * `EngineError::NotNextExpectedStep` - a concurrent writer moved the pointer
    #[instrument(skip(self))]
    pub fn recalculate(&self, tenant_id: &str, exception_id: &str) -> EngineResult<AssignmentResult> {
        let exception = self.load_exception(tenant_id, exception_id)?;
        let outcome = self.matcher.find_matching_playbook(tenant_id, &exception.classification)?;

        let Some(playbook) = outcome.playbook else {
            self.write_pointer(&exception, PlaybookPointer::unassigned(), Vec::new())?;
            info!(tenant_id, exception_id, "No playbook matched; pointer cleared");
            return Ok(AssignmentResult {
                exception_id: exception_id.to_string(),
                playbook_id: None,
                current_step: None,
                reasoning: outcome.reasoning,
            });
        };

        let total_steps = self.steps.list_ordered(playbook.playbook_id)?.len();
        let mut events = vec![NewEvent {
            tenant_id: tenant_id.to_string(),
            exception_id: exception_id.to_string(),
            event_type: EventType::PlaybookStarted,
            actor_type: ActorType::System,
            actor_id: self.config.system_actor_id.clone(),
            playbook_id: Some(playbook.playbook_id),
            step_order: None,
            payload: json!({
                "playbook_id": playbook.playbook_id,
                "playbook_name": playbook.name,
                "playbook_version": playbook.version,
                "total_steps": total_steps,
            }),
        }];

        // A playbook without steps has nothing to point at and is done at once.
        let pointer = if total_steps == 0 {
            warn!(tenant_id, exception_id, playbook_id = playbook.playbook_id, "Matched playbook has no steps");
            events.push(playbook_completed_event(
                tenant_id,
                exception_id,
                playbook.playbook_id,
                0,
                ActorType::System,
                &self.config.system_actor_id,
            ));
            PlaybookPointer::completed(playbook.playbook_id)
        } else {
            PlaybookPointer::active(playbook.playbook_id, 1)
        };
        self.write_pointer(&exception, pointer, events)?;

        info!(
            tenant_id,
            exception_id,
            playbook_id = playbook.playbook_id,
            total_steps,
            "Playbook assigned"
        );

        Ok(AssignmentResult {
            exception_id: exception_id.to_string(),
            playbook_id: pointer.playbook_id,
            current_step: pointer.current_step,
            reasoning: outcome.reasoning,
        })
    }

    /// Completes the exception's current step.
    ///
    /// Checks run in order and the first failure wins: step order, actor
    /// type, exception lookup, assignment, expected step, then the risky
    /// action gate. Re-submitting the still-current step after its completion
    /// was already recorded returns the current status without a new event.
    ///
    /// # Errors
    ///
    /// * `EngineError::InvalidStepOrder` - `step_order < 1`
    /// * `EngineError::InvalidActorType` - not human, agent or system
    /// * `EngineError::NotFound` - missing or foreign exception
    /// * `EngineError::NoPlaybookAssigned` - pointer is unassigned
    /// * `EngineError::NotNextExpectedStep` - not the current step, or a concurrent writer won
    /// * `EngineError::RequiresHumanApproval` - risky step submitted by a non-human
    #[instrument(skip(self))]
    pub fn complete_step(
        &self,
        tenant_id: &str,
        exception_id: &str,
        step_order: i64,
        actor_type: &str,
        actor_id: &str,
        notes: Option<&str>,
    ) -> EngineResult<StatusProjection> {
        if step_order < 1 {
            return Err(EngineError::InvalidStepOrder(step_order));
        }
        let actor_type: ActorType =
            actor_type.parse().map_err(|_| EngineError::InvalidActorType(actor_type.to_string()))?;

        let exception = self.load_exception(tenant_id, exception_id)?;
        let playbook_id = match exception.pointer.state() {
            PointerState::Unassigned => {
                return Err(EngineError::NoPlaybookAssigned(exception_id.to_string()));
            }
            PointerState::Completed { playbook_id } => {
                return Err(EngineError::NotNextExpectedStep(format!(
                    "playbook {} is already completed for exception {}; step {} requested",
                    playbook_id, exception_id, step_order
                )));
            }
            PointerState::Active { step, .. } if step != step_order => {
                return Err(EngineError::NotNextExpectedStep(format!(
                    "exception {} is at step {}; step {} requested",
                    exception_id, step, step_order
                )));
            }
            PointerState::Active { playbook_id, .. } => playbook_id,
        };

        if self.events.exists(
            exception_id,
            playbook_id,
            Some(step_order),
            &EventType::PlaybookStepCompleted,
        )? {
            debug!(tenant_id, exception_id, playbook_id, step_order, "Step already recorded; replaying status");
            return self.project(tenant_id, &exception);
        }

        let steps = self.steps.list_ordered(playbook_id)?;
        let step = steps.iter().find(|s| s.step_order == step_order).ok_or_else(|| {
            StorageError::NotFound(format!("step {} of playbook {}", step_order, playbook_id))
        })?;

        if self.config.is_risky(&step.action_type) && actor_type != ActorType::Human {
            warn!(
                tenant_id,
                exception_id,
                playbook_id,
                step_order,
                action_type = %step.action_type,
                actor_type = %actor_type,
                "Risky step rejected without human actor"
            );
            return Err(EngineError::RequiresHumanApproval {
                step_order,
                action_type: step.action_type.to_string(),
            });
        }

        let is_last_step = steps.last().is_some_and(|last| last.step_order == step_order);
        let next = if is_last_step {
            PlaybookPointer::completed(playbook_id)
        } else {
            PlaybookPointer::active(playbook_id, step_order + 1)
        };
        let mut events =
            vec![step_completed_event(&exception, step, actor_type, actor_id, is_last_step, notes)];
        if is_last_step {
            events.push(playbook_completed_event(
                tenant_id,
                exception_id,
                playbook_id,
                steps.len(),
                actor_type,
                actor_id,
            ));
        }
        let updated = self.write_pointer(&exception, next, events)?;

        info!(tenant_id, exception_id, playbook_id, step_order, actor_id, "Step completed");
        if is_last_step {
            info!(tenant_id, exception_id, playbook_id, "Playbook completed");
        }

        let playbook = self.playbooks.get(tenant_id, playbook_id)?;
        Ok(StatusProjection::build(&updated.exception_id, updated.pointer, playbook.as_ref(), &steps))
    }

    /// Returns the exception's progress through its assigned playbook.
    ///
    /// A playbook deleted after assignment yields a projection with the id
    /// kept and no playbook details.
    ///
    /// # Errors
    ///
    /// * `EngineError::NotFound` - missing or foreign exception
    #[instrument(skip(self))]
    pub fn get_status(&self, tenant_id: &str, exception_id: &str) -> EngineResult<StatusProjection> {
        let exception = self.load_exception(tenant_id, exception_id)?;
        self.project(tenant_id, &exception)
    }

    /// Returns the exception's audit trail, oldest first.
    ///
    /// # Errors
    ///
    /// * `EngineError::NotFound` - missing or foreign exception
    #[instrument(skip(self))]
    pub fn events(&self, tenant_id: &str, exception_id: &str) -> EngineResult<Vec<EventRecord>> {
        self.load_exception(tenant_id, exception_id)?;
        Ok(self.events.list(exception_id)?)
    }

    fn load_exception(&self, tenant_id: &str, exception_id: &str) -> EngineResult<Exception> {
        self.exceptions.get(tenant_id, exception_id).map_err(|e| match e {
            StorageError::NotFound(_) => EngineError::NotFound(exception_id.to_string()),
            other => EngineError::Storage(other),
        })
    }

    fn write_pointer(
        &self,
        exception: &Exception,
        new: PlaybookPointer,
        events: Vec<NewEvent>,
    ) -> EngineResult<Exception> {
        self.exceptions
            .advance_pointer(&exception.tenant_id, &exception.exception_id, exception.pointer, new, events)
            .map(|(updated, _)| updated)
            .map_err(|e| match e {
                StorageError::Conflict(detail) => {
                    warn!(
                        tenant_id = %exception.tenant_id,
                        exception_id = %exception.exception_id,
                        %detail,
                        "Pointer moved by a concurrent writer"
                    );
                    EngineError::NotNextExpectedStep(detail)
                }
                StorageError::NotFound(_) => EngineError::NotFound(exception.exception_id.clone()),
                other => EngineError::Storage(other),
            })
    }

    fn project(&self, tenant_id: &str, exception: &Exception) -> EngineResult<StatusProjection> {
        let Some(playbook_id) = exception.pointer.playbook_id else {
            return Ok(StatusProjection::unassigned(&exception.exception_id));
        };

        let Some(playbook) = self.playbooks.get(tenant_id, playbook_id)? else {
            warn!(
                tenant_id,
                exception_id = %exception.exception_id,
                playbook_id,
                "Assigned playbook no longer exists"
            );
            return Ok(StatusProjection::build(&exception.exception_id, exception.pointer, None, &[]));
        };

        let steps = self.steps.list_ordered(playbook_id)?;
        Ok(StatusProjection::build(&exception.exception_id, exception.pointer, Some(&playbook), &steps))
    }
}

fn playbook_completed_event(
    tenant_id: &str,
    exception_id: &str,
    playbook_id: i64,
    total_steps: usize,
    actor_type: ActorType,
    actor_id: &str,
) -> NewEvent {
    NewEvent {
        tenant_id: tenant_id.to_string(),
        exception_id: exception_id.to_string(),
        event_type: EventType::PlaybookCompleted,
        actor_type,
        actor_id: actor_id.to_string(),
        playbook_id: Some(playbook_id),
        step_order: None,
        payload: json!({
            "playbook_id": playbook_id,
            "total_steps": total_steps,
        }),
    }
}

fn step_completed_event(
    exception: &Exception,
    step: &PlaybookStep,
    actor_type: ActorType,
    actor_id: &str,
    is_last_step: bool,
    notes: Option<&str>,
) -> NewEvent {
    let mut payload = json!({
        "playbook_id": step.playbook_id,
        "step_id": step.step_id,
        "step_order": step.step_order,
        "step_name": step.name,
        "action_type": step.action_type.as_str(),
        "is_last_step": is_last_step,
    });
    if let Some(notes) = notes {
        payload["notes"] = json!(notes);
    }

    NewEvent {
        tenant_id: exception.tenant_id.clone(),
        exception_id: exception.exception_id.clone(),
        event_type: EventType::PlaybookStepCompleted,
        actor_type,
        actor_id: actor_id.to_string(),
        playbook_id: Some(step.playbook_id),
        step_order: Some(step.step_order),
        payload,
    }
}
