//! Storage layer for Remedy Core.
//!
//! Persistence is expressed as four collaborator traits consumed by the
//! engine. Two backends implement all of them: a SQLite store and an
//! in-memory store.

// SQL strings don't need hash-less raw strings
#![allow(clippy::needless_raw_string_hashes)]

pub mod database;
pub mod error;
pub mod memory;
pub mod repositories;
pub mod sqlite;

pub use database::Database;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use repositories::{EventLog, ExceptionStore, PlaybookStepStore, PlaybookStore, RemediationStore};
pub use sqlite::SqliteStore;
