//! Collaborator interfaces consumed by the step execution engine.
//!
//! Exception and playbook identifiers are unique across tenants, but every
//! tenant-scoped read also filters on the tenant so that a foreign record is
//! indistinguishable from a missing one.

use crate::models::{
    Classification, EventRecord, EventType, Exception, NewEvent, Playbook, PlaybookPointer,
    PlaybookStep,
};
use crate::storage::error::{StorageError, StorageResult};

/// Read/update access to exception records.
pub trait ExceptionStore: Send + Sync {
    /// Creates a new exception.
    fn insert_exception(&self, exception: &Exception) -> StorageResult<()>;

    /// Retrieves an exception owned by `tenant_id`.
    ///
    /// Returns `StorageError::NotFound` for missing and foreign exceptions alike.
    fn get(&self, tenant_id: &str, exception_id: &str) -> StorageResult<Exception>;

    /// Replaces the playbook pointer if it still equals `expected` and
    /// appends `events` in the same unit of work.
    ///
    /// Either the pointer moves and every event is recorded, or nothing is
    /// written. Returns `StorageError::Conflict` when another writer moved
    /// the pointer since it was read, and `StorageError::NotFound` for
    /// missing or foreign exceptions.
    fn advance_pointer(
        &self,
        tenant_id: &str,
        exception_id: &str,
        expected: PlaybookPointer,
        new: PlaybookPointer,
        events: Vec<NewEvent>,
    ) -> StorageResult<(Exception, Vec<EventRecord>)>;

    /// Replaces the playbook pointer if it still equals `expected`, without
    /// recording events.
    fn update_pointer(
        &self,
        tenant_id: &str,
        exception_id: &str,
        expected: PlaybookPointer,
        new: PlaybookPointer,
    ) -> StorageResult<Exception> {
        self.advance_pointer(tenant_id, exception_id, expected, new, Vec::new())
            .map(|(exception, _)| exception)
    }

    /// Replaces the classification without touching the pointer.
    fn update_classification(
        &self,
        tenant_id: &str,
        exception_id: &str,
        classification: &Classification,
    ) -> StorageResult<Exception>;
}

/// Read access to playbook definitions.
pub trait PlaybookStore: Send + Sync {
    /// Creates a new playbook row.
    fn insert_playbook(&self, playbook: &Playbook) -> StorageResult<()>;

    /// Creates a playbook together with its steps; nothing is stored when
    /// either part is rejected.
    fn insert_playbook_with_steps(
        &self,
        playbook: &Playbook,
        steps: &[PlaybookStep],
    ) -> StorageResult<()>;

    /// Lists every active playbook of a tenant.
    fn list_active(&self, tenant_id: &str) -> StorageResult<Vec<Playbook>>;

    /// Retrieves a playbook owned by `tenant_id`, active or not.
    fn get(&self, tenant_id: &str, playbook_id: i64) -> StorageResult<Option<Playbook>>;

    /// Deletes a playbook and its steps; returns whether it existed.
    ///
    /// Exceptions already pointing at the playbook keep their pointer.
    fn delete_playbook(&self, tenant_id: &str, playbook_id: i64) -> StorageResult<bool>;
}

/// Read access to playbook steps.
pub trait PlaybookStepStore: Send + Sync {
    /// Stores the steps of a playbook.
    fn insert_steps(&self, playbook_id: i64, steps: &[PlaybookStep]) -> StorageResult<()>;

    /// Lists the steps of a playbook sorted ascending by `step_order`.
    fn list_ordered(&self, playbook_id: i64) -> StorageResult<Vec<PlaybookStep>>;
}

/// Append-only, time-ordered lifecycle log.
pub trait EventLog: Send + Sync {
    /// Appends an event and returns the stored record.
    fn append(&self, event: NewEvent) -> StorageResult<EventRecord>;

    /// Checks for a matching event in the exception's current playbook run.
    ///
    /// Only events recorded since the exception's most recent
    /// `PlaybookStarted` are considered, so a playbook restarted by
    /// recalculation is worked through again rather than replayed.
    fn exists(
        &self,
        exception_id: &str,
        playbook_id: i64,
        step_order: Option<i64>,
        event_type: &EventType,
    ) -> StorageResult<bool>;

    /// Lists every event of an exception, oldest first.
    fn list(&self, exception_id: &str) -> StorageResult<Vec<EventRecord>>;
}

/// Rejects events recorded against an exception other than the one whose
/// pointer is being advanced.
pub(crate) fn check_event_owner(
    tenant_id: &str,
    exception_id: &str,
    events: &[NewEvent],
) -> StorageResult<()> {
    match events.iter().find(|e| e.tenant_id != tenant_id || e.exception_id != exception_id) {
        Some(event) => Err(StorageError::InvalidData(format!(
            "{} event for exception {} cannot advance exception {}",
            event.event_type, event.exception_id, exception_id
        ))),
        None => Ok(()),
    }
}

/// A single backend providing every collaborator.
pub trait RemediationStore: ExceptionStore + PlaybookStore + PlaybookStepStore + EventLog {}

impl<T> RemediationStore for T where T: ExceptionStore + PlaybookStore + PlaybookStepStore + EventLog {}
