//! Playbook data structures.
//!
//! A playbook is a versioned, tenant-scoped remediation procedure. Its match
//! predicate is parsed once into [`MatchConditions`] and evaluated against an
//! exception's [`Classification`] without re-reading the stored document.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::exception::Classification;

/// Match predicate of a playbook.
///
/// Every field is optional; an absent field matches any value. An empty
/// `severity_in` set is treated the same as an absent one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConditions {
    /// Required exception domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Required exception type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_type: Option<String>,
    /// Accepted severities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_in: Option<BTreeSet<String>>,
}

impl MatchConditions {
    /// Creates a predicate that matches everything.
    pub fn any() -> Self {
        Self::default()
    }

    /// Requires the given domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Requires the given exception type.
    #[must_use]
    pub fn with_exception_type(mut self, exception_type: impl Into<String>) -> Self {
        self.exception_type = Some(exception_type.into());
        self
    }

    /// Restricts the accepted severities.
    #[must_use]
    pub fn with_severities<I, S>(mut self, severities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.severity_in = Some(severities.into_iter().map(Into::into).collect());
        self
    }

    /// Checks whether a classification satisfies every specified field.
    ///
    /// A required field that is missing on the classification never matches.
    pub fn matches(&self, classification: &Classification) -> bool {
        if let Some(domain) = &self.domain {
            if classification.domain.as_deref() != Some(domain.as_str()) {
                return false;
            }
        }

        if let Some(exception_type) = &self.exception_type {
            if classification.exception_type.as_deref() != Some(exception_type.as_str()) {
                return false;
            }
        }

        if let Some(severities) = self.severity_in.as_ref().filter(|s| !s.is_empty()) {
            match classification.severity.as_deref() {
                Some(severity) if severities.contains(severity) => {}
                _ => return false,
            }
        }

        true
    }
}

impl fmt::Display for MatchConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let domain = self.domain.as_deref().unwrap_or("*");
        let exception_type = self.exception_type.as_deref().unwrap_or("*");
        write!(f, "domain={}, exception_type={}", domain, exception_type)?;
        match self.severity_in.as_ref().filter(|s| !s.is_empty()) {
            Some(severities) => {
                let list: Vec<&str> = severities.iter().map(String::as_str).collect();
                write!(f, ", severity in [{}]", list.join(", "))
            }
            None => write!(f, ", severity=*"),
        }
    }
}

/// Persisted shape of a playbook's match rule.
///
/// Stored as `{"match": {...}, "priority": n}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
    /// Match predicate.
    #[serde(rename = "match", default)]
    pub conditions: MatchConditions,
    /// Higher priority wins among matching playbooks.
    #[serde(default)]
    pub priority: i64,
}

/// Kind of work a playbook step performs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    /// Send a notification.
    Notify,
    /// Invoke an external tool.
    CallTool,
    /// Change the exception's status.
    SetStatus,
    /// Escalate to another team or tier.
    Escalate,
    /// Any action type not known to the engine.
    Other(String),
}

impl ActionType {
    /// Returns the canonical string form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Notify => "notify",
            Self::CallTool => "call_tool",
            Self::SetStatus => "set_status",
            Self::Escalate => "escalate",
            Self::Other(other) => other.as_str(),
        }
    }
}

impl From<String> for ActionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "notify" => Self::Notify,
            "call_tool" => Self::CallTool,
            "set_status" => Self::SetStatus,
            "escalate" => Self::Escalate,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for ActionType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ActionType> for String {
    fn from(value: ActionType) -> Self {
        match value {
            ActionType::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for ActionType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tenant-scoped remediation procedure.
///
/// Immutable once created; a new version is a new row with its own id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    /// Owning tenant.
    pub tenant_id: String,
    /// Identifier, unique within the tenant.
    pub playbook_id: i64,
    /// Human-readable name.
    pub name: String,
    /// Definition version.
    pub version: i32,
    /// Match predicate.
    pub conditions: MatchConditions,
    /// Higher priority wins among matching playbooks.
    pub priority: i64,
    /// Inactive playbooks are never selected by the matcher.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Playbook {
    /// Creates an active playbook that matches everything at priority 0.
    pub fn new(
        tenant_id: impl Into<String>,
        playbook_id: i64,
        name: impl Into<String>,
        version: i32,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            playbook_id,
            name: name.into(),
            version,
            conditions: MatchConditions::any(),
            priority: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Sets the match predicate.
    #[must_use]
    pub fn with_conditions(mut self, conditions: MatchConditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Marks the playbook inactive.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Returns the persisted match rule.
    pub fn match_rule(&self) -> MatchRule {
        MatchRule { conditions: self.conditions.clone(), priority: self.priority }
    }
}

/// One ordered unit of work within a playbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookStep {
    /// Step identifier.
    pub step_id: String,
    /// Owning playbook.
    pub playbook_id: i64,
    /// 1-based position within the playbook.
    pub step_order: i64,
    /// Human-readable name.
    pub name: String,
    /// Kind of action.
    pub action_type: ActionType,
    /// Action parameters.
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
}

fn empty_params() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl PlaybookStep {
    /// Creates a step with empty parameters and a derived step id.
    pub fn new(
        playbook_id: i64,
        step_order: i64,
        name: impl Into<String>,
        action_type: impl Into<ActionType>,
    ) -> Self {
        Self {
            step_id: format!("{}-{}", playbook_id, step_order),
            playbook_id,
            step_order,
            name: name.into(),
            action_type: action_type.into(),
            params: empty_params(),
        }
    }

    /// Sets the action parameters.
    #[must_use]
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}
