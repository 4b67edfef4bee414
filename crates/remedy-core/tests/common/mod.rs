//! Shared test utilities for Remedy Core integration tests.
//!
//! Every scenario runs against both storage backends; a [`Fixture`] bundles
//! a store with an engine over it.

#![allow(dead_code)]

use std::sync::Arc;

use remedy_core::{
    ActionType, Classification, EngineConfig, EventLog, EventType, Exception, ExceptionStore,
    MatchConditions, MemoryStore, Playbook, PlaybookPointer, PlaybookStep, PlaybookStepStore,
    PlaybookStore, RemediationStore, SqliteStore, StepExecutionEngine,
};
use tempfile::TempDir;

/// A store plus an engine over it.
pub struct Fixture {
    pub name: &'static str,
    pub store: Arc<dyn RemediationStore>,
    pub engine: StepExecutionEngine,
    _temp_dir: Option<TempDir>,
}

impl Fixture {
    fn build<S: RemediationStore + 'static>(
        name: &'static str,
        store: Arc<S>,
        config: EngineConfig,
        temp_dir: Option<TempDir>,
    ) -> Self {
        let engine = StepExecutionEngine::with_store(store.clone(), config);
        Self { name, store, engine, _temp_dir: temp_dir }
    }

    /// In-memory backend.
    pub fn memory(config: EngineConfig) -> Self {
        Self::build("memory", Arc::new(MemoryStore::new()), config, None)
    }

    /// SQLite backend on a temporary file.
    pub fn sqlite(config: EngineConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("remedy.db");
        let store = SqliteStore::open(path.to_str().expect("Non UTF-8 temp path"))
            .expect("Failed to open SQLite store");
        Self::build("sqlite", Arc::new(store), config, Some(temp_dir))
    }

    /// Adds a playbook whose steps have the given action types, in order.
    pub fn add_playbook(
        &self,
        tenant_id: &str,
        playbook_id: i64,
        name: &str,
        conditions: MatchConditions,
        priority: i64,
        actions: &[ActionType],
    ) {
        self.store
            .insert_playbook(
                &Playbook::new(tenant_id, playbook_id, name, 1)
                    .with_conditions(conditions)
                    .with_priority(priority),
            )
            .expect("Failed to insert playbook");

        let steps: Vec<PlaybookStep> = (1..)
            .zip(actions)
            .map(|(order, action)| {
                PlaybookStep::new(playbook_id, order, format!("Step {}", order), action.clone())
            })
            .collect();
        self.store.insert_steps(playbook_id, &steps).expect("Failed to insert steps");
    }

    /// Adds an unassigned exception.
    pub fn add_exception(
        &self,
        tenant_id: &str,
        exception_id: &str,
        domain: Option<&str>,
        exception_type: Option<&str>,
        severity: Option<&str>,
    ) {
        self.store
            .insert_exception(&Exception::new(
                tenant_id,
                exception_id,
                classification(domain, exception_type, severity),
            ))
            .expect("Failed to insert exception");
    }

    /// Seeds the two Finance playbooks used across scenarios.
    ///
    /// * P1: `domain=Finance, exception_type=PaymentFailure`, priority 100,
    ///   steps notify, call_tool, set_status
    /// * P2: `domain=Finance`, priority 50, one notify step
    pub fn seed_finance(&self, tenant_id: &str) {
        self.add_playbook(
            tenant_id,
            1,
            "Payment failure remediation",
            MatchConditions::any().with_domain("Finance").with_exception_type("PaymentFailure"),
            100,
            &[ActionType::Notify, ActionType::CallTool, ActionType::SetStatus],
        );
        self.add_playbook(
            tenant_id,
            2,
            "Finance triage",
            MatchConditions::any().with_domain("Finance"),
            50,
            &[ActionType::Notify],
        );
    }

    /// Reads the stored pointer of an exception.
    pub fn pointer(&self, tenant_id: &str, exception_id: &str) -> PlaybookPointer {
        ExceptionStore::get(&*self.store, tenant_id, exception_id)
            .expect("Failed to load exception")
            .pointer
    }

    /// Lists the event types recorded for an exception.
    pub fn event_types(&self, exception_id: &str) -> Vec<EventType> {
        self.store
            .list(exception_id)
            .expect("Failed to list events")
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    /// Completes a step as a human operator.
    pub fn complete_as_human(&self, tenant_id: &str, exception_id: &str, step_order: i64) {
        self.engine
            .complete_step(tenant_id, exception_id, step_order, "human", "alice", None)
            .unwrap_or_else(|e| panic!("[{}] step {} failed: {}", self.name, step_order, e));
    }
}

/// Both backends with the default engine configuration.
pub fn backends() -> Vec<Fixture> {
    vec![Fixture::memory(EngineConfig::default()), Fixture::sqlite(EngineConfig::default())]
}

/// Builds a classification from optional fields.
pub fn classification(
    domain: Option<&str>,
    exception_type: Option<&str>,
    severity: Option<&str>,
) -> Classification {
    Classification {
        domain: domain.map(String::from),
        exception_type: exception_type.map(String::from),
        severity: severity.map(String::from),
    }
}
