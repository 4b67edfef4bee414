//! Data models for Remedy Core.
//!
//! Playbooks and their steps are read-only definitions; exceptions carry the
//! mutable playbook pointer; events form the append-only audit trail.

pub mod event;
pub mod exception;
pub mod playbook;

pub use event::{ActorType, EventRecord, EventType, NewEvent, ParseActorTypeError};
pub use exception::{Classification, Exception, PlaybookPointer, PointerState};
pub use playbook::{ActionType, MatchConditions, MatchRule, Playbook, PlaybookStep};
