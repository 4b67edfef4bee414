//! Playbook selection and authored definitions.
//!
//! The matcher picks the playbook that governs an exception; the definition
//! loader turns YAML files into playbook and step records.

pub mod definition;
pub mod matcher;

pub use definition::{DefinitionError, DefinitionLoader, PlaybookDefinition, StepDefinition};
pub use matcher::{MatchOutcome, PlaybookMatcher, find_matching_playbook};
