//! Lifecycle events recorded in the append-only event log.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// A playbook was assigned and its first step became current.
    PlaybookStarted,
    /// A single step was completed.
    PlaybookStepCompleted,
    /// The last step of the assigned playbook was completed.
    PlaybookCompleted,
    /// Event written by another subsystem.
    Other(String),
}

impl EventType {
    /// Returns the canonical string form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::PlaybookStarted => "PlaybookStarted",
            Self::PlaybookStepCompleted => "PlaybookStepCompleted",
            Self::PlaybookCompleted => "PlaybookCompleted",
            Self::Other(other) => other.as_str(),
        }
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PlaybookStarted" => Self::PlaybookStarted,
            "PlaybookStepCompleted" => Self::PlaybookStepCompleted,
            "PlaybookCompleted" => Self::PlaybookCompleted,
            _ => Self::Other(value),
        }
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        match value {
            EventType::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity that caused an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    /// A human operator.
    Human,
    /// An autonomous agent.
    Agent,
    /// The platform itself.
    System,
}

impl ActorType {
    /// Returns the canonical string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Agent => "agent",
            Self::System => "system",
        }
    }
}

/// Error returned when an actor type string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid actor type '{0}': expected human, agent or system")]
pub struct ParseActorTypeError(pub String);

impl FromStr for ActorType {
    type Err = ParseActorTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(Self::Human),
            "agent" => Ok(Self::Agent),
            "system" => Ok(Self::System),
            other => Err(ParseActorTypeError(other.to_string())),
        }
    }
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event about to be appended.
///
/// `playbook_id` and `step_order` duplicate payload fields so the log can
/// answer idempotency queries without parsing payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Owning tenant.
    pub tenant_id: String,
    /// Exception the event belongs to.
    pub exception_id: String,
    /// Kind of event.
    pub event_type: EventType,
    /// Who caused it.
    pub actor_type: ActorType,
    /// Identifier of the actor.
    pub actor_id: String,
    /// Playbook the event refers to.
    pub playbook_id: Option<i64>,
    /// Step the event refers to.
    pub step_order: Option<i64>,
    /// Structured payload.
    pub payload: serde_json::Value,
}

/// An event as stored in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Store-assigned position; strictly increasing in append order.
    pub sequence: i64,
    /// Owning tenant.
    pub tenant_id: String,
    /// Exception the event belongs to.
    pub exception_id: String,
    /// Kind of event.
    pub event_type: EventType,
    /// Who caused it.
    pub actor_type: ActorType,
    /// Identifier of the actor.
    pub actor_id: String,
    /// Playbook the event refers to.
    pub playbook_id: Option<i64>,
    /// Step the event refers to.
    pub step_order: Option<i64>,
    /// Structured payload.
    pub payload: serde_json::Value,
    /// When the event was appended.
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    /// Materialises a record from a new event.
    pub fn from_new(sequence: i64, event: NewEvent, created_at: DateTime<Utc>) -> Self {
        Self {
            sequence,
            tenant_id: event.tenant_id,
            exception_id: event.exception_id,
            event_type: event.event_type,
            actor_type: event.actor_type,
            actor_id: event.actor_id,
            playbook_id: event.playbook_id,
            step_order: event.step_order,
            payload: event.payload,
            created_at,
        }
    }
}
