//! In-memory implementation of the remediation collaborators.
//!
//! Mirrors the SQLite store's observable behaviour, including tenant
//! scoping, guarded pointer updates and run-scoped event lookups. Useful for
//! tests and for embedding the engine without a database file.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, info};

use crate::models::{
    Classification, EventRecord, EventType, Exception, NewEvent, Playbook, PlaybookPointer,
    PlaybookStep,
};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::repositories::{
    EventLog, ExceptionStore, PlaybookStepStore, PlaybookStore, check_event_owner,
};

fn read<T>(lock: &RwLock<T>) -> StorageResult<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|e| StorageError::InvalidData(format!("Failed to acquire lock: {}", e)))
}

fn write<T>(lock: &RwLock<T>) -> StorageResult<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|e| StorageError::InvalidData(format!("Failed to acquire lock: {}", e)))
}

fn exception_not_found(exception_id: &str) -> StorageError {
    StorageError::NotFound(format!("exception {} not found", exception_id))
}

fn push_event(log: &mut Vec<EventRecord>, event: NewEvent) -> EventRecord {
    let sequence = log.last().map_or(1, |e| e.sequence + 1);
    let record = EventRecord::from_new(sequence, event, Utc::now());
    log.push(record.clone());
    record
}

/// Store keeping every record in process memory.
#[derive(Default)]
pub struct MemoryStore {
    exceptions: RwLock<HashMap<String, Exception>>,
    playbooks: RwLock<HashMap<i64, Playbook>>,
    steps: RwLock<HashMap<i64, Vec<PlaybookStep>>>,
    events: RwLock<Vec<EventRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExceptionStore for MemoryStore {
    fn insert_exception(&self, exception: &Exception) -> StorageResult<()> {
        let mut exceptions = write(&self.exceptions)?;
        if exceptions.contains_key(&exception.exception_id) {
            return Err(StorageError::InvalidData(format!(
                "exception {} already exists",
                exception.exception_id
            )));
        }
        exceptions.insert(exception.exception_id.clone(), exception.clone());
        info!(tenant_id = %exception.tenant_id, exception_id = %exception.exception_id, "Created exception");
        Ok(())
    }

    fn get(&self, tenant_id: &str, exception_id: &str) -> StorageResult<Exception> {
        read(&self.exceptions)?
            .get(exception_id)
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .ok_or_else(|| exception_not_found(exception_id))
    }

    fn advance_pointer(
        &self,
        tenant_id: &str,
        exception_id: &str,
        expected: PlaybookPointer,
        new: PlaybookPointer,
        events: Vec<NewEvent>,
    ) -> StorageResult<(Exception, Vec<EventRecord>)> {
        check_event_owner(tenant_id, exception_id, &events)?;

        // Lock order: exceptions, then events.
        let mut exceptions = write(&self.exceptions)?;
        let mut log = write(&self.events)?;
        let exception = exceptions
            .get_mut(exception_id)
            .filter(|e| e.tenant_id == tenant_id)
            .ok_or_else(|| exception_not_found(exception_id))?;

        if exception.pointer != expected {
            return Err(StorageError::Conflict(format!(
                "exception {} pointer is {}, expected {}",
                exception_id, exception.pointer, expected
            )));
        }

        exception.pointer = new;
        exception.updated_at = Utc::now();
        let records: Vec<EventRecord> = events
            .into_iter()
            .map(|event| {
                let record = push_event(&mut log, event);
                debug!(exception_id, event_type = %record.event_type, sequence = record.sequence, "Appended event");
                record
            })
            .collect();
        debug!(tenant_id, exception_id, pointer = %new, events = records.len(), "Advanced exception pointer");
        Ok((exception.clone(), records))
    }

    fn update_classification(
        &self,
        tenant_id: &str,
        exception_id: &str,
        classification: &Classification,
    ) -> StorageResult<Exception> {
        let mut exceptions = write(&self.exceptions)?;
        let exception = exceptions
            .get_mut(exception_id)
            .filter(|e| e.tenant_id == tenant_id)
            .ok_or_else(|| exception_not_found(exception_id))?;

        exception.classification = classification.clone();
        exception.updated_at = Utc::now();
        debug!(tenant_id, exception_id, %classification, "Updated exception classification");
        Ok(exception.clone())
    }
}

impl PlaybookStore for MemoryStore {
    fn insert_playbook(&self, playbook: &Playbook) -> StorageResult<()> {
        let mut playbooks = write(&self.playbooks)?;
        if playbooks.contains_key(&playbook.playbook_id) {
            return Err(StorageError::InvalidData(format!(
                "playbook {} already exists",
                playbook.playbook_id
            )));
        }
        playbooks.insert(playbook.playbook_id, playbook.clone());
        info!(tenant_id = %playbook.tenant_id, playbook_id = playbook.playbook_id, "Created playbook");
        Ok(())
    }

    fn insert_playbook_with_steps(
        &self,
        playbook: &Playbook,
        steps: &[PlaybookStep],
    ) -> StorageResult<()> {
        let mut playbooks = write(&self.playbooks)?;
        let mut all_steps = write(&self.steps)?;
        if playbooks.contains_key(&playbook.playbook_id) {
            return Err(StorageError::InvalidData(format!(
                "playbook {} already exists",
                playbook.playbook_id
            )));
        }
        let mut orders: Vec<i64> = steps.iter().map(|s| s.step_order).collect();
        orders.sort_unstable();
        if orders.windows(2).any(|w| w[0] == w[1]) {
            return Err(StorageError::InvalidData(format!(
                "playbook {} has duplicate step orders",
                playbook.playbook_id
            )));
        }

        let mut stored: Vec<PlaybookStep> = steps
            .iter()
            .cloned()
            .map(|mut s| {
                s.playbook_id = playbook.playbook_id;
                s
            })
            .collect();
        stored.sort_by_key(|s| s.step_order);
        playbooks.insert(playbook.playbook_id, playbook.clone());
        all_steps.insert(playbook.playbook_id, stored);
        info!(
            tenant_id = %playbook.tenant_id,
            playbook_id = playbook.playbook_id,
            steps = steps.len(),
            "Created playbook"
        );
        Ok(())
    }

    fn list_active(&self, tenant_id: &str) -> StorageResult<Vec<Playbook>> {
        let mut active: Vec<Playbook> = read(&self.playbooks)?
            .values()
            .filter(|p| p.tenant_id == tenant_id && p.is_active)
            .cloned()
            .collect();
        active.sort_by_key(|p| p.playbook_id);
        Ok(active)
    }

    fn get(&self, tenant_id: &str, playbook_id: i64) -> StorageResult<Option<Playbook>> {
        Ok(read(&self.playbooks)?.get(&playbook_id).filter(|p| p.tenant_id == tenant_id).cloned())
    }

    fn delete_playbook(&self, tenant_id: &str, playbook_id: i64) -> StorageResult<bool> {
        let mut playbooks = write(&self.playbooks)?;
        if !playbooks.get(&playbook_id).is_some_and(|p| p.tenant_id == tenant_id) {
            return Ok(false);
        }
        playbooks.remove(&playbook_id);
        write(&self.steps)?.remove(&playbook_id);
        info!(tenant_id, playbook_id, "Deleted playbook");
        Ok(true)
    }
}

impl PlaybookStepStore for MemoryStore {
    fn insert_steps(&self, playbook_id: i64, steps: &[PlaybookStep]) -> StorageResult<()> {
        if !read(&self.playbooks)?.contains_key(&playbook_id) {
            return Err(StorageError::NotFound(format!("playbook {} not found", playbook_id)));
        }

        let mut all_steps = write(&self.steps)?;
        let existing = all_steps.entry(playbook_id).or_default();
        for step in steps {
            if existing.iter().any(|s| s.step_order == step.step_order) {
                return Err(StorageError::InvalidData(format!(
                    "playbook {} already has a step {}",
                    playbook_id, step.step_order
                )));
            }
        }
        existing.extend(steps.iter().cloned().map(|mut s| {
            s.playbook_id = playbook_id;
            s
        }));
        existing.sort_by_key(|s| s.step_order);
        debug!(playbook_id, count = steps.len(), "Stored playbook steps");
        Ok(())
    }

    fn list_ordered(&self, playbook_id: i64) -> StorageResult<Vec<PlaybookStep>> {
        Ok(read(&self.steps)?.get(&playbook_id).cloned().unwrap_or_default())
    }
}

impl EventLog for MemoryStore {
    fn append(&self, event: NewEvent) -> StorageResult<EventRecord> {
        let record = push_event(&mut *write(&self.events)?, event);
        debug!(exception_id = %record.exception_id, event_type = %record.event_type, sequence = record.sequence, "Appended event");
        Ok(record)
    }

    fn exists(
        &self,
        exception_id: &str,
        playbook_id: i64,
        step_order: Option<i64>,
        event_type: &EventType,
    ) -> StorageResult<bool> {
        let events = read(&self.events)?;
        let run_start = events
            .iter()
            .rposition(|e| {
                e.exception_id == exception_id && e.event_type == EventType::PlaybookStarted
            })
            .map_or(0, |idx| idx + 1);

        Ok(events[run_start..].iter().any(|e| {
            e.exception_id == exception_id
                && e.playbook_id == Some(playbook_id)
                && e.step_order == step_order
                && &e.event_type == event_type
        }))
    }

    fn list(&self, exception_id: &str) -> StorageResult<Vec<EventRecord>> {
        Ok(read(&self.events)?.iter().filter(|e| e.exception_id == exception_id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionType, ActorType};

    fn event(exception_id: &str, event_type: EventType, step_order: Option<i64>) -> NewEvent {
        NewEvent {
            tenant_id: "tenant-a".to_string(),
            exception_id: exception_id.to_string(),
            event_type,
            actor_type: ActorType::Human,
            actor_id: "alice".to_string(),
            playbook_id: Some(1),
            step_order,
            payload: serde_json::json!({}),
        }
    }

    #[test]
    fn test_exception_tenant_scoping() {
        let store = MemoryStore::new();
        store
            .insert_exception(&Exception::new("tenant-a", "exc-1", Classification::default()))
            .unwrap();

        assert!(ExceptionStore::get(&store, "tenant-a", "exc-1").is_ok());
        assert!(matches!(
            ExceptionStore::get(&store, "tenant-b", "exc-1"),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.update_pointer(
                "tenant-b",
                "exc-1",
                PlaybookPointer::unassigned(),
                PlaybookPointer::active(1, 1)
            ),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_exception_rejected() {
        let store = MemoryStore::new();
        let exception = Exception::new("tenant-a", "exc-1", Classification::default());
        store.insert_exception(&exception).unwrap();
        assert!(store.insert_exception(&exception).is_err());
    }

    #[test]
    fn test_update_pointer_conflict() {
        let store = MemoryStore::new();
        store
            .insert_exception(&Exception::new("tenant-a", "exc-1", Classification::default()))
            .unwrap();
        store
            .update_pointer(
                "tenant-a",
                "exc-1",
                PlaybookPointer::unassigned(),
                PlaybookPointer::active(1, 1),
            )
            .unwrap();

        let err = store
            .update_pointer(
                "tenant-a",
                "exc-1",
                PlaybookPointer::unassigned(),
                PlaybookPointer::active(1, 2),
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert_eq!(
            ExceptionStore::get(&store, "tenant-a", "exc-1").unwrap().pointer,
            PlaybookPointer::active(1, 1)
        );
    }

    #[test]
    fn test_steps_require_playbook() {
        let store = MemoryStore::new();
        let result = store.insert_steps(9, &[PlaybookStep::new(9, 1, "Notify", ActionType::Notify)]);
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_steps_sorted_and_unique() {
        let store = MemoryStore::new();
        store.insert_playbook(&Playbook::new("tenant-a", 1, "Retry", 1)).unwrap();
        store
            .insert_steps(
                1,
                &[
                    PlaybookStep::new(1, 2, "Retry", ActionType::CallTool),
                    PlaybookStep::new(1, 1, "Notify", ActionType::Notify),
                ],
            )
            .unwrap();

        let orders: Vec<i64> = store.list_ordered(1).unwrap().iter().map(|s| s.step_order).collect();
        assert_eq!(orders, vec![1, 2]);

        assert!(store.insert_steps(1, &[PlaybookStep::new(1, 2, "Again", ActionType::Notify)]).is_err());
    }

    #[test]
    fn test_delete_playbook_is_tenant_scoped() {
        let store = MemoryStore::new();
        store.insert_playbook(&Playbook::new("tenant-a", 1, "Retry", 1)).unwrap();
        store.insert_steps(1, &[PlaybookStep::new(1, 1, "Notify", ActionType::Notify)]).unwrap();

        assert!(!store.delete_playbook("tenant-b", 1).unwrap());
        assert!(store.delete_playbook("tenant-a", 1).unwrap());
        assert!(PlaybookStore::get(&store, "tenant-a", 1).unwrap().is_none());
        assert!(store.list_ordered(1).unwrap().is_empty());
    }

    #[test]
    fn test_exists_scoped_to_current_run() {
        let store = MemoryStore::new();
        store.append(event("exc-1", EventType::PlaybookStarted, None)).unwrap();
        store.append(event("exc-1", EventType::PlaybookStepCompleted, Some(1))).unwrap();
        store.append(event("exc-2", EventType::PlaybookStarted, None)).unwrap();

        assert!(store.exists("exc-1", 1, Some(1), &EventType::PlaybookStepCompleted).unwrap());
        assert!(!store.exists("exc-2", 1, Some(1), &EventType::PlaybookStepCompleted).unwrap());

        store.append(event("exc-1", EventType::PlaybookStarted, None)).unwrap();
        assert!(!store.exists("exc-1", 1, Some(1), &EventType::PlaybookStepCompleted).unwrap());
    }

    #[test]
    fn test_event_sequences_increase() {
        let store = MemoryStore::new();
        let a = store.append(event("exc-1", EventType::PlaybookStarted, None)).unwrap();
        let b = store.append(event("exc-2", EventType::PlaybookStarted, None)).unwrap();
        assert!(b.sequence > a.sequence);
        assert_eq!(store.list("exc-1").unwrap().len(), 1);
    }

    #[test]
    fn test_advance_pointer_records_events() {
        let store = MemoryStore::new();
        store
            .insert_exception(&Exception::new("tenant-a", "exc-1", Classification::default()))
            .unwrap();

        let (exception, records) = store
            .advance_pointer(
                "tenant-a",
                "exc-1",
                PlaybookPointer::unassigned(),
                PlaybookPointer::active(1, 2),
                vec![
                    event("exc-1", EventType::PlaybookStarted, None),
                    event("exc-1", EventType::PlaybookStepCompleted, Some(1)),
                ],
            )
            .unwrap();
        assert_eq!(exception.pointer, PlaybookPointer::active(1, 2));
        assert!(records[1].sequence > records[0].sequence);
        assert_eq!(store.list("exc-1").unwrap().len(), 2);
    }

    #[test]
    fn test_advance_pointer_writes_nothing_on_failure() {
        let store = MemoryStore::new();
        store
            .insert_exception(&Exception::new("tenant-a", "exc-1", Classification::default()))
            .unwrap();

        // An event for another exception is rejected before anything moves.
        let result = store.advance_pointer(
            "tenant-a",
            "exc-1",
            PlaybookPointer::unassigned(),
            PlaybookPointer::active(1, 1),
            vec![
                event("exc-1", EventType::PlaybookStarted, None),
                event("exc-2", EventType::PlaybookStarted, None),
            ],
        );
        assert!(matches!(result, Err(StorageError::InvalidData(_))));

        // So is a stale expectation.
        let result = store.advance_pointer(
            "tenant-a",
            "exc-1",
            PlaybookPointer::active(1, 1),
            PlaybookPointer::active(1, 2),
            vec![event("exc-1", EventType::PlaybookStepCompleted, Some(1))],
        );
        assert!(matches!(result, Err(StorageError::Conflict(_))));

        assert_eq!(
            ExceptionStore::get(&store, "tenant-a", "exc-1").unwrap().pointer,
            PlaybookPointer::unassigned()
        );
        assert!(store.list("exc-1").unwrap().is_empty());
        assert!(store.list("exc-2").unwrap().is_empty());
    }

    #[test]
    fn test_insert_playbook_with_steps_is_all_or_nothing() {
        let store = MemoryStore::new();
        let playbook = Playbook::new("tenant-a", 1, "Retry", 1);

        let result = store.insert_playbook_with_steps(
            &playbook,
            &[
                PlaybookStep::new(1, 1, "Notify", ActionType::Notify),
                PlaybookStep::new(1, 1, "Again", ActionType::Notify),
            ],
        );
        assert!(matches!(result, Err(StorageError::InvalidData(_))));
        assert!(PlaybookStore::get(&store, "tenant-a", 1).unwrap().is_none());
        assert!(store.list_ordered(1).unwrap().is_empty());

        store
            .insert_playbook_with_steps(
                &playbook,
                &[
                    PlaybookStep::new(1, 2, "Retry", ActionType::CallTool),
                    PlaybookStep::new(1, 1, "Notify", ActionType::Notify),
                ],
            )
            .unwrap();
        let orders: Vec<i64> = store.list_ordered(1).unwrap().iter().map(|s| s.step_order).collect();
        assert_eq!(orders, vec![1, 2]);

        // An existing playbook keeps its steps.
        assert!(
            store
                .insert_playbook_with_steps(&playbook, &[PlaybookStep::new(1, 3, "Close", ActionType::SetStatus)])
                .is_err()
        );
        assert_eq!(store.list_ordered(1).unwrap().len(), 2);
    }
}
