//! Remedy Core - playbook matching and step execution for exception remediation.
//!
//! This crate provides:
//! - Selection of the remediation playbook for an exception's classification
//! - A step execution engine enforcing ordering, idempotency, tenant
//!   isolation and human approval of risky actions
//! - SQLite and in-memory storage for exceptions, playbooks and the event log
//! - YAML playbook definitions and TOML configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use remedy_core::{Config, SqliteStore, StepExecutionEngine};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::discover_and_load();
//!     let store = Arc::new(SqliteStore::open(&config.storage.database_path)?);
//!     let engine = StepExecutionEngine::with_store(store, config.engine);
//!
//!     let assignment = engine.recalculate("acme", "exc-42")?;
//!     println!("{}", assignment.reasoning);
//!
//!     engine.complete_step("acme", "exc-42", 1, "human", "alice", None)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod playbooks;
pub mod storage;

pub use config::{Config, ConfigError, EngineConfig, StorageConfig};
pub use engine::{AssignmentResult, StatusProjection, StepExecutionEngine, StepStatus, StepView};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use models::{
    ActionType, ActorType, Classification, EventRecord, EventType, Exception, MatchConditions,
    MatchRule, NewEvent, Playbook, PlaybookPointer, PlaybookStep, PointerState,
};
pub use playbooks::{
    DefinitionError, DefinitionLoader, MatchOutcome, PlaybookDefinition, PlaybookMatcher,
    StepDefinition, find_matching_playbook,
};
pub use storage::{
    Database, EventLog, ExceptionStore, MemoryStore, PlaybookStepStore, PlaybookStore,
    RemediationStore, SqliteStore, StorageError, StorageResult,
};
