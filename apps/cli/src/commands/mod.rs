//! Command implementations for the Remedy CLI.

pub mod exception;
pub mod load;
pub mod playbooks;
pub mod status;
pub mod step;
pub mod types;

use std::sync::Arc;

use anyhow::Context as _;
use remedy_core::{Config, EngineError, SqliteStore, StepExecutionEngine};
use tracing::debug;

pub use types::{ExceptionCommand, PlaybooksCommand};

/// Shared state for a single CLI invocation.
pub struct Context {
    pub store: Arc<SqliteStore>,
    pub engine: StepExecutionEngine,
}

impl Context {
    /// Open the configured database and build an engine on top of it.
    pub fn open(config: Config) -> anyhow::Result<Self> {
        let path = config.storage.database_path;
        debug!(database = %path, "Opening database");

        let store = Arc::new(
            SqliteStore::open(&path).with_context(|| format!("Failed to open database {}", path))?,
        );
        let engine = StepExecutionEngine::with_store(Arc::clone(&store), config.engine);
        Ok(Self { store, engine })
    }
}

/// Convert an engine error into an error message carrying its kind.
pub fn engine_error(err: EngineError) -> anyhow::Error {
    anyhow::anyhow!("{}: {}", err.kind(), err)
}
