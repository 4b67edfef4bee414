//! YAML playbook definitions.
//!
//! A definition file describes one playbook and its steps:
//!
//! ```yaml
//! playbook_id: 1
//! tenant_id: acme
//! name: Payment failure remediation
//! version: 1
//! match:
//!   domain: Finance
//!   exception_type: PaymentFailure
//!   severity_in: [HIGH, CRITICAL]
//! priority: 100
//! steps:
//!   - step_order: 1
//!     name: Notify payment owner
//!     action_type: notify
//!   - step_order: 2
//!     name: Retry payment
//!     action_type: call_tool
//!     params:
//!       tool: payments.retry
//! ```

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::models::{ActionType, MatchConditions, Playbook, PlaybookStep};
use crate::storage::{PlaybookStore, StorageError};

/// Errors that can occur while loading playbook definitions.
#[derive(Error, Debug)]
pub enum DefinitionError {
    /// Failed to read a definition file.
    #[error("Failed to load playbook definition at {path}: {source}")]
    LoadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse definition YAML.
    #[error("Failed to parse playbook definition{}: {source}", location(.path))]
    ParseError {
        path: Option<PathBuf>,
        #[source]
        source: serde_yaml::Error,
    },

    /// Definition parsed but violates a playbook invariant.
    #[error("Invalid playbook definition: {0}")]
    InvalidDefinition(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Installing the definition failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

fn location(path: &Option<PathBuf>) -> String {
    path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default()
}

/// Result type alias for definition operations.
pub type Result<T> = std::result::Result<T, DefinitionError>;

fn default_active() -> bool {
    true
}

fn empty_params() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// A playbook together with its steps, as authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookDefinition {
    /// Playbook identifier.
    pub playbook_id: i64,
    /// Owning tenant.
    pub tenant_id: String,
    /// Human-readable name.
    pub name: String,
    /// Definition version.
    pub version: i32,
    /// Whether the matcher may select this playbook.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Match predicate.
    #[serde(rename = "match", default)]
    pub conditions: MatchConditions,
    /// Higher priority wins among matching playbooks.
    #[serde(default)]
    pub priority: i64,
    /// Ordered steps.
    pub steps: Vec<StepDefinition>,
}

/// One authored step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// 1-based position.
    pub step_order: i64,
    /// Human-readable name.
    pub name: String,
    /// Kind of action.
    pub action_type: ActionType,
    /// Action parameters.
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
}

impl PlaybookDefinition {
    /// Validates the definition.
    ///
    /// # Errors
    ///
    /// Returns error if an id or version is not positive, a name is empty, or
    /// the step orders are not exactly `1..N`.
    pub fn validate(&self) -> Result<()> {
        if self.playbook_id < 1 {
            return Err(DefinitionError::InvalidDefinition(format!(
                "playbook_id must be positive, got {}",
                self.playbook_id
            )));
        }
        if self.version < 1 {
            return Err(DefinitionError::InvalidDefinition(format!(
                "playbook {} version must be positive, got {}",
                self.playbook_id, self.version
            )));
        }
        if self.tenant_id.trim().is_empty() {
            return Err(DefinitionError::InvalidDefinition(format!(
                "playbook {} has an empty tenant_id",
                self.playbook_id
            )));
        }
        if self.name.trim().is_empty() {
            return Err(DefinitionError::InvalidDefinition(format!(
                "playbook {} has an empty name",
                self.playbook_id
            )));
        }
        if self.steps.is_empty() {
            return Err(DefinitionError::InvalidDefinition(format!(
                "playbook {} has no steps",
                self.playbook_id
            )));
        }

        let mut orders: Vec<i64> = self.steps.iter().map(|s| s.step_order).collect();
        orders.sort_unstable();
        for (expected, actual) in (1..).zip(&orders) {
            if *actual != expected {
                return Err(DefinitionError::InvalidDefinition(format!(
                    "playbook {} step orders must be 1..{} without gaps or duplicates, got {:?}",
                    self.playbook_id,
                    orders.len(),
                    orders
                )));
            }
        }

        if let Some(step) = self.steps.iter().find(|s| s.name.trim().is_empty()) {
            return Err(DefinitionError::InvalidDefinition(format!(
                "playbook {} step {} has an empty name",
                self.playbook_id, step.step_order
            )));
        }

        Ok(())
    }

    /// Builds the playbook record.
    pub fn to_playbook(&self) -> Playbook {
        Playbook {
            tenant_id: self.tenant_id.clone(),
            playbook_id: self.playbook_id,
            name: self.name.clone(),
            version: self.version,
            conditions: self.conditions.clone(),
            priority: self.priority,
            is_active: self.active,
            created_at: Utc::now(),
        }
    }

    /// Builds the step records, sorted by order.
    pub fn to_steps(&self) -> Vec<PlaybookStep> {
        let mut steps: Vec<PlaybookStep> = self
            .steps
            .iter()
            .map(|s| {
                PlaybookStep::new(self.playbook_id, s.step_order, s.name.clone(), s.action_type.clone())
                    .with_params(s.params.clone())
            })
            .collect();
        steps.sort_by_key(|s| s.step_order);
        steps
    }
}

/// Loader for YAML playbook definitions.
pub struct DefinitionLoader;

impl DefinitionLoader {
    /// Parse and validate a definition from YAML.
    ///
    /// # Errors
    ///
    /// Returns error if the YAML is malformed or the definition is invalid.
    pub fn parse(content: &str) -> Result<PlaybookDefinition> {
        let definition: PlaybookDefinition = serde_yaml::from_str(content)
            .map_err(|e| DefinitionError::ParseError { path: None, source: e })?;
        definition.validate()?;
        Ok(definition)
    }

    /// Parse a definition from a file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn parse_file(path: impl AsRef<Path>) -> Result<PlaybookDefinition> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DefinitionError::LoadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        match Self::parse(&content) {
            Err(DefinitionError::ParseError { source, .. }) => {
                Err(DefinitionError::ParseError { path: Some(path.to_path_buf()), source })
            }
            other => other,
        }
    }

    /// Parse every `*.yaml` / `*.yml` file under `dir`, in path order.
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable or invalid file.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<PlaybookDefinition>> {
        let mut definitions = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| DefinitionError::Io(e.into()))?;
            let path = entry.path();

            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml");
            if path.is_file() && is_yaml {
                debug!(path = %path.display(), "Loading playbook definition");
                definitions.push(Self::parse_file(path)?);
            }
        }

        Ok(definitions)
    }

    /// Load a single file, or every definition in a directory.
    pub fn load_path(path: impl AsRef<Path>) -> Result<Vec<PlaybookDefinition>> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::load_dir(path)
        } else {
            Ok(vec![Self::parse_file(path)?])
        }
    }

    /// Store a definition's playbook and steps.
    ///
    /// # Errors
    ///
    /// Returns error if the definition is invalid or a record already exists.
    /// Nothing is stored when installation fails.
    pub fn install<S>(definition: &PlaybookDefinition, store: &S) -> Result<Playbook>
    where
        S: PlaybookStore + ?Sized,
    {
        definition.validate()?;

        let playbook = definition.to_playbook();
        store.insert_playbook_with_steps(&playbook, &definition.to_steps())?;

        info!(
            tenant_id = %playbook.tenant_id,
            playbook_id = playbook.playbook_id,
            version = playbook.version,
            steps = definition.steps.len(),
            "Installed playbook definition"
        );
        Ok(playbook)
    }
}
