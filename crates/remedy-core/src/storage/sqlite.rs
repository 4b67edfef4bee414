//! SQLite implementation of the remediation collaborators.
//!
//! A single [`SqliteStore`] serves exceptions, playbooks, steps and events
//! from one shared connection.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use crate::models::{
    ActorType, Classification, EventRecord, EventType, Exception, MatchRule, NewEvent, Playbook,
    PlaybookPointer, PlaybookStep,
};
use crate::storage::database::Database;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::repositories::{
    EventLog, ExceptionStore, PlaybookStepStore, PlaybookStore, check_event_owner,
};

const EXCEPTION_COLUMNS: &str = "exception_id, tenant_id, domain, exception_type, severity, current_playbook_id, current_step, created_at, updated_at";
const PLAYBOOK_COLUMNS: &str =
    "playbook_id, tenant_id, name, version, match_json, priority, is_active, created_at";
const EVENT_COLUMNS: &str = "sequence, tenant_id, exception_id, event_type, actor_type, actor_id, playbook_id, step_order, payload_json, created_at";

// ============================================================================
// Row Parsing Helpers
// ============================================================================

fn invalid_column(idx: usize, column_name: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(idx, column_name.to_string(), rusqlite::types::Type::Text)
}

/// Parses a JSON field from a row into a deserializable type.
fn parse_json_field<T>(row: &Row, idx: usize, column_name: &str) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let json_str: String = row.get(idx)?;
    serde_json::from_str(&json_str).map_err(|_| invalid_column(idx, column_name))
}

/// Parses an RFC3339 timestamp string from a row into a `DateTime<Utc>`.
fn parse_timestamp(row: &Row, idx: usize, column_name: &str) -> rusqlite::Result<DateTime<Utc>> {
    let timestamp_str: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&timestamp_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| invalid_column(idx, column_name))
}

fn exception_from_row(row: &Row) -> rusqlite::Result<Exception> {
    let pointer = PlaybookPointer::from_parts(row.get(5)?, row.get(6)?)
        .ok_or_else(|| invalid_column(6, "current_step"))?;
    Ok(Exception {
        exception_id: row.get(0)?,
        tenant_id: row.get(1)?,
        classification: Classification {
            domain: row.get(2)?,
            exception_type: row.get(3)?,
            severity: row.get(4)?,
        },
        pointer,
        created_at: parse_timestamp(row, 7, "created_at")?,
        updated_at: parse_timestamp(row, 8, "updated_at")?,
    })
}

fn playbook_from_row(row: &Row) -> rusqlite::Result<Playbook> {
    let rule: MatchRule = parse_json_field(row, 4, "match_json")?;
    Ok(Playbook {
        playbook_id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        version: row.get(3)?,
        conditions: rule.conditions,
        priority: row.get(5)?,
        is_active: row.get(6)?,
        created_at: parse_timestamp(row, 7, "created_at")?,
    })
}

fn step_from_row(row: &Row) -> rusqlite::Result<PlaybookStep> {
    let action_type: String = row.get(4)?;
    Ok(PlaybookStep {
        step_id: row.get(0)?,
        playbook_id: row.get(1)?,
        step_order: row.get(2)?,
        name: row.get(3)?,
        action_type: action_type.into(),
        params: parse_json_field(row, 5, "params_json")?,
    })
}

fn event_from_row(row: &Row) -> rusqlite::Result<EventRecord> {
    let event_type: String = row.get(3)?;
    let actor_type: String = row.get(4)?;
    let actor_type: ActorType = actor_type.parse().map_err(|_| invalid_column(4, "actor_type"))?;
    Ok(EventRecord {
        sequence: row.get(0)?,
        tenant_id: row.get(1)?,
        exception_id: row.get(2)?,
        event_type: event_type.into(),
        actor_type,
        actor_id: row.get(5)?,
        playbook_id: row.get(6)?,
        step_order: row.get(7)?,
        payload: parse_json_field(row, 8, "payload_json")?,
        created_at: parse_timestamp(row, 9, "created_at")?,
    })
}

fn exception_not_found(exception_id: &str) -> StorageError {
    StorageError::NotFound(format!("exception {} not found", exception_id))
}

fn load_exception(
    conn: &Connection,
    tenant_id: &str,
    exception_id: &str,
) -> StorageResult<Option<Exception>> {
    let sql = format!(
        "SELECT {} FROM exceptions WHERE exception_id = ?1 AND tenant_id = ?2",
        EXCEPTION_COLUMNS
    );
    Ok(conn.query_row(&sql, params![exception_id, tenant_id], exception_from_row).optional()?)
}

// ============================================================================
// Write Helpers
// ============================================================================

fn insert_playbook_row(conn: &Connection, playbook: &Playbook) -> StorageResult<()> {
    let match_json = serde_json::to_string(&playbook.match_rule())?;
    conn.execute(
        "INSERT INTO playbooks (playbook_id, tenant_id, name, version, match_json, priority, is_active, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            playbook.playbook_id,
            playbook.tenant_id,
            playbook.name,
            playbook.version,
            match_json,
            playbook.priority,
            playbook.is_active,
            playbook.created_at.to_rfc3339()
        ],
    )?;
    Ok(())
}

fn insert_step_rows(conn: &Connection, playbook_id: i64, steps: &[PlaybookStep]) -> StorageResult<()> {
    for step in steps {
        let params_json = serde_json::to_string(&step.params)?;
        conn.execute(
            "INSERT INTO playbook_steps (step_id, playbook_id, step_order, name, action_type, params_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![step.step_id, playbook_id, step.step_order, step.name, step.action_type.as_str(), params_json],
        )?;
    }
    Ok(())
}

fn insert_event_row(conn: &Connection, event: NewEvent) -> StorageResult<EventRecord> {
    let payload_json = serde_json::to_string(&event.payload)?;
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO exception_events (tenant_id, exception_id, event_type, actor_type, actor_id, playbook_id, step_order, payload_json, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            event.tenant_id,
            event.exception_id,
            event.event_type.as_str(),
            event.actor_type.as_str(),
            event.actor_id,
            event.playbook_id,
            event.step_order,
            payload_json,
            created_at.to_rfc3339()
        ],
    )?;
    let sequence = conn.last_insert_rowid();
    debug!(exception_id = %event.exception_id, event_type = %event.event_type, sequence, "Appended event");
    Ok(EventRecord::from_new(sequence, event, created_at))
}

// ============================================================================
// SQLite Store
// ============================================================================

/// SQLite-backed store implementing every remediation collaborator.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteStore {
    /// Wraps a shared database handle.
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Opens (or creates) the database file at `path`.
    pub fn open(path: &str) -> StorageResult<Self> {
        Ok(Self::new(Arc::new(Mutex::new(Database::open(path)?))))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self::new(Arc::new(Mutex::new(Database::open_in_memory()?))))
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|e| StorageError::InvalidData(format!("Database lock error: {}", e)))
    }
}

impl ExceptionStore for SqliteStore {
    fn insert_exception(&self, exception: &Exception) -> StorageResult<()> {
        let db = self.lock()?;
        db.conn().execute(
            "INSERT INTO exceptions (exception_id, tenant_id, domain, exception_type, severity, current_playbook_id, current_step, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                exception.exception_id,
                exception.tenant_id,
                exception.classification.domain,
                exception.classification.exception_type,
                exception.classification.severity,
                exception.pointer.playbook_id,
                exception.pointer.current_step,
                exception.created_at.to_rfc3339(),
                exception.updated_at.to_rfc3339()
            ],
        )?;
        info!(tenant_id = %exception.tenant_id, exception_id = %exception.exception_id, "Created exception");
        Ok(())
    }

    fn get(&self, tenant_id: &str, exception_id: &str) -> StorageResult<Exception> {
        let db = self.lock()?;
        load_exception(db.conn(), tenant_id, exception_id)?
            .ok_or_else(|| exception_not_found(exception_id))
    }

    fn advance_pointer(
        &self,
        tenant_id: &str,
        exception_id: &str,
        expected: PlaybookPointer,
        new: PlaybookPointer,
        events: Vec<NewEvent>,
    ) -> StorageResult<(Exception, Vec<EventRecord>)> {
        check_event_owner(tenant_id, exception_id, &events)?;
        let mut db = self.lock()?;
        let result = db.transaction(|tx| {
            let rows_affected = tx.execute(
                "UPDATE exceptions SET current_playbook_id = ?3, current_step = ?4, updated_at = ?5 \
                 WHERE exception_id = ?1 AND tenant_id = ?2 \
                 AND current_playbook_id IS ?6 AND current_step IS ?7",
                params![
                    exception_id,
                    tenant_id,
                    new.playbook_id,
                    new.current_step,
                    Utc::now().to_rfc3339(),
                    expected.playbook_id,
                    expected.current_step
                ],
            )?;

            let exception = load_exception(tx, tenant_id, exception_id)?
                .ok_or_else(|| exception_not_found(exception_id))?;
            if rows_affected == 0 {
                return Err(StorageError::Conflict(format!(
                    "exception {} pointer is {}, expected {}",
                    exception_id, exception.pointer, expected
                )));
            }

            let records = events
                .into_iter()
                .map(|event| insert_event_row(tx, event))
                .collect::<StorageResult<Vec<_>>>()?;
            Ok((exception, records))
        })?;
        debug!(tenant_id, exception_id, pointer = %new, events = result.1.len(), "Advanced exception pointer");
        Ok(result)
    }

    fn update_classification(
        &self,
        tenant_id: &str,
        exception_id: &str,
        classification: &Classification,
    ) -> StorageResult<Exception> {
        let db = self.lock()?;
        let conn = db.conn();
        let rows_affected = conn.execute(
            "UPDATE exceptions SET domain = ?3, exception_type = ?4, severity = ?5, updated_at = ?6 WHERE exception_id = ?1 AND tenant_id = ?2",
            params![
                exception_id,
                tenant_id,
                classification.domain,
                classification.exception_type,
                classification.severity,
                Utc::now().to_rfc3339()
            ],
        )?;
        if rows_affected == 0 {
            return Err(exception_not_found(exception_id));
        }
        debug!(tenant_id, exception_id, %classification, "Updated exception classification");
        load_exception(conn, tenant_id, exception_id)?.ok_or_else(|| exception_not_found(exception_id))
    }
}

impl PlaybookStore for SqliteStore {
    fn insert_playbook(&self, playbook: &Playbook) -> StorageResult<()> {
        let db = self.lock()?;
        insert_playbook_row(db.conn(), playbook)?;
        info!(tenant_id = %playbook.tenant_id, playbook_id = playbook.playbook_id, "Created playbook");
        Ok(())
    }

    fn insert_playbook_with_steps(
        &self,
        playbook: &Playbook,
        steps: &[PlaybookStep],
    ) -> StorageResult<()> {
        let mut db = self.lock()?;
        db.transaction(|tx| {
            insert_playbook_row(tx, playbook)?;
            insert_step_rows(tx, playbook.playbook_id, steps)
        })?;
        info!(
            tenant_id = %playbook.tenant_id,
            playbook_id = playbook.playbook_id,
            steps = steps.len(),
            "Created playbook"
        );
        Ok(())
    }

    fn list_active(&self, tenant_id: &str) -> StorageResult<Vec<Playbook>> {
        let db = self.lock()?;
        let sql = format!(
            "SELECT {} FROM playbooks WHERE tenant_id = ?1 AND is_active = 1 ORDER BY playbook_id",
            PLAYBOOK_COLUMNS
        );
        let mut stmt = db.conn().prepare(&sql)?;
        let playbooks = stmt
            .query_map(params![tenant_id], playbook_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(playbooks)
    }

    fn get(&self, tenant_id: &str, playbook_id: i64) -> StorageResult<Option<Playbook>> {
        let db = self.lock()?;
        let sql = format!(
            "SELECT {} FROM playbooks WHERE tenant_id = ?1 AND playbook_id = ?2",
            PLAYBOOK_COLUMNS
        );
        Ok(db.conn().query_row(&sql, params![tenant_id, playbook_id], playbook_from_row).optional()?)
    }

    fn delete_playbook(&self, tenant_id: &str, playbook_id: i64) -> StorageResult<bool> {
        let db = self.lock()?;
        let rows_affected = db.conn().execute(
            "DELETE FROM playbooks WHERE tenant_id = ?1 AND playbook_id = ?2",
            params![tenant_id, playbook_id],
        )?;
        if rows_affected > 0 {
            info!(tenant_id, playbook_id, "Deleted playbook");
        }
        Ok(rows_affected > 0)
    }
}

impl PlaybookStepStore for SqliteStore {
    fn insert_steps(&self, playbook_id: i64, steps: &[PlaybookStep]) -> StorageResult<()> {
        let mut db = self.lock()?;
        db.transaction(|tx| insert_step_rows(tx, playbook_id, steps))?;
        debug!(playbook_id, count = steps.len(), "Stored playbook steps");
        Ok(())
    }

    fn list_ordered(&self, playbook_id: i64) -> StorageResult<Vec<PlaybookStep>> {
        let db = self.lock()?;
        let mut stmt = db.conn().prepare(
            "SELECT step_id, playbook_id, step_order, name, action_type, params_json FROM playbook_steps WHERE playbook_id = ?1 ORDER BY step_order",
        )?;
        let steps = stmt
            .query_map(params![playbook_id], step_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(steps)
    }
}

impl EventLog for SqliteStore {
    fn append(&self, event: NewEvent) -> StorageResult<EventRecord> {
        let db = self.lock()?;
        insert_event_row(db.conn(), event)
    }

    fn exists(
        &self,
        exception_id: &str,
        playbook_id: i64,
        step_order: Option<i64>,
        event_type: &EventType,
    ) -> StorageResult<bool> {
        let db = self.lock()?;
        let found: bool = db.conn().query_row(
            "SELECT EXISTS (
                SELECT 1 FROM exception_events
                WHERE exception_id = ?1 AND playbook_id = ?2 AND step_order IS ?3 AND event_type = ?4
                AND sequence > COALESCE((
                    SELECT MAX(sequence) FROM exception_events
                    WHERE exception_id = ?1 AND event_type = ?5
                ), 0)
            )",
            params![
                exception_id,
                playbook_id,
                step_order,
                event_type.as_str(),
                EventType::PlaybookStarted.as_str()
            ],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    fn list(&self, exception_id: &str) -> StorageResult<Vec<EventRecord>> {
        let db = self.lock()?;
        let sql = format!(
            "SELECT {} FROM exception_events WHERE exception_id = ?1 ORDER BY sequence",
            EVENT_COLUMNS
        );
        let mut stmt = db.conn().prepare(&sql)?;
        let events = stmt
            .query_map(params![exception_id], event_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }
}
