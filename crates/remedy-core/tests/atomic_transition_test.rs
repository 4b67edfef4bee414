//! A transition whose events cannot be recorded leaves the exception where it was.

use std::sync::{Arc, Mutex};

use remedy_core::{
    ActionType, Classification, Database, EngineConfig, ErrorKind, EventLog, EventType, Exception,
    ExceptionStore, MatchConditions, Playbook, PlaybookPointer, PlaybookStep, PlaybookStore,
    SqliteStore, StepExecutionEngine,
};

struct Harness {
    db: Arc<Mutex<Database>>,
    store: Arc<SqliteStore>,
    engine: StepExecutionEngine,
}

impl Harness {
    fn new() -> Self {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let store = Arc::new(SqliteStore::new(Arc::clone(&db)));
        store
            .insert_playbook_with_steps(
                &Playbook::new("acme", 1, "Payment failure remediation", 1)
                    .with_conditions(MatchConditions::any().with_domain("Finance"))
                    .with_priority(100),
                &[
                    PlaybookStep::new(1, 1, "Notify owner", ActionType::Notify),
                    PlaybookStep::new(1, 2, "Close", ActionType::SetStatus),
                ],
            )
            .unwrap();
        store
            .insert_exception(&Exception::new(
                "acme",
                "exc-1",
                Classification { domain: Some("Finance".to_string()), ..Classification::default() },
            ))
            .unwrap();
        let engine = StepExecutionEngine::with_store(Arc::clone(&store), EngineConfig::default());
        Self { db, store, engine }
    }

    /// Makes every insert of `event_type` into the log fail.
    fn reject_events(&self, event_type: &EventType) {
        self.db
            .lock()
            .unwrap()
            .conn()
            .execute_batch(&format!(
                "CREATE TRIGGER reject_events BEFORE INSERT ON exception_events
                 WHEN NEW.event_type = '{}'
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
                event_type
            ))
            .unwrap();
    }

    fn accept_events(&self) {
        self.db.lock().unwrap().conn().execute_batch("DROP TRIGGER reject_events;").unwrap();
    }

    fn pointer(&self) -> PlaybookPointer {
        ExceptionStore::get(&*self.store, "acme", "exc-1").unwrap().pointer
    }

    fn event_types(&self) -> Vec<EventType> {
        self.store.list("exc-1").unwrap().into_iter().map(|e| e.event_type).collect()
    }
}

#[test]
fn test_failed_step_event_keeps_pointer_and_allows_retry() {
    let h = Harness::new();
    h.engine.recalculate("acme", "exc-1").unwrap();

    h.reject_events(&EventType::PlaybookStepCompleted);
    let err = h.engine.complete_step("acme", "exc-1", 1, "human", "alice", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(h.pointer(), PlaybookPointer::active(1, 1));
    assert_eq!(h.event_types(), vec![EventType::PlaybookStarted]);

    h.accept_events();
    let status = h.engine.complete_step("acme", "exc-1", 1, "human", "alice", None).unwrap();
    assert_eq!(status.current_step, Some(2));
    assert_eq!(h.event_types(), vec![EventType::PlaybookStarted, EventType::PlaybookStepCompleted]);
}

#[test]
fn test_failed_completion_event_keeps_last_step_current() {
    let h = Harness::new();
    h.engine.recalculate("acme", "exc-1").unwrap();
    h.engine.complete_step("acme", "exc-1", 1, "human", "alice", None).unwrap();

    // The step event itself would be accepted; the playbook completion is not.
    h.reject_events(&EventType::PlaybookCompleted);
    assert!(h.engine.complete_step("acme", "exc-1", 2, "human", "alice", None).is_err());
    assert_eq!(h.pointer(), PlaybookPointer::active(1, 2));
    assert_eq!(h.event_types().len(), 2);

    h.accept_events();
    let status = h.engine.complete_step("acme", "exc-1", 2, "human", "alice", None).unwrap();
    assert!(status.is_completed);
    assert_eq!(
        h.event_types(),
        vec![
            EventType::PlaybookStarted,
            EventType::PlaybookStepCompleted,
            EventType::PlaybookStepCompleted,
            EventType::PlaybookCompleted,
        ]
    );
}

#[test]
fn test_failed_start_event_keeps_exception_unassigned() {
    let h = Harness::new();

    h.reject_events(&EventType::PlaybookStarted);
    assert_eq!(h.engine.recalculate("acme", "exc-1").unwrap_err().kind(), ErrorKind::Storage);
    assert_eq!(h.pointer(), PlaybookPointer::unassigned());
    assert!(h.event_types().is_empty());

    h.accept_events();
    assert_eq!(h.engine.recalculate("acme", "exc-1").unwrap().playbook_id, Some(1));
    assert_eq!(h.pointer(), PlaybookPointer::active(1, 1));
}
