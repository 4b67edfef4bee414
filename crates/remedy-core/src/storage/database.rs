//! Database connection and schema management.

use rusqlite::Connection;
use tracing::info;

use crate::storage::error::StorageResult;

/// Database connection wrapper.
///
/// Manages SQLite connection and schema initialization.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a new database connection at the specified path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    /// A new `Database` instance with initialized schema.
    ///
    /// # Errors
    /// * `StorageError::Connection` - If the database connection fails
    pub fn open(path: &str) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Opens an in-memory database for testing.
    ///
    /// # Errors
    /// * `StorageError::Connection` - If the database connection fails
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Gets a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Gets a mutable reference to the underlying connection.
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Initializes the database schema.
    ///
    /// The exception pointer deliberately has no foreign key to `playbooks`:
    /// a playbook deleted after assignment must leave the pointer intact.
    fn init_schema(&self) -> StorageResult<()> {
        info!("Initializing database schema");

        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS exceptions (
                exception_id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                domain TEXT,
                exception_type TEXT,
                severity TEXT,
                current_playbook_id INTEGER,
                current_step INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK (current_step IS NULL OR current_playbook_id IS NOT NULL)
            )
            "#,
            [],
        )?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS playbooks (
                playbook_id INTEGER PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                name TEXT NOT NULL,
                version INTEGER NOT NULL,
                match_json TEXT NOT NULL,
                priority INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS playbook_steps (
                step_id TEXT PRIMARY KEY,
                playbook_id INTEGER NOT NULL,
                step_order INTEGER NOT NULL,
                name TEXT NOT NULL,
                action_type TEXT NOT NULL,
                params_json TEXT NOT NULL,
                UNIQUE (playbook_id, step_order),
                FOREIGN KEY (playbook_id) REFERENCES playbooks(playbook_id) ON DELETE CASCADE
            )
            "#,
            [],
        )?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS exception_events (
                sequence INTEGER PRIMARY KEY AUTOINCREMENT,
                tenant_id TEXT NOT NULL,
                exception_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                actor_type TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                playbook_id INTEGER,
                step_order INTEGER,
                payload_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        // The event log is append-only.
        self.conn.execute_batch(
            r#"
            CREATE TRIGGER IF NOT EXISTS exception_events_no_update
            BEFORE UPDATE ON exception_events
            BEGIN
                SELECT RAISE(ABORT, 'exception_events is append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS exception_events_no_delete
            BEFORE DELETE ON exception_events
            BEGIN
                SELECT RAISE(ABORT, 'exception_events is append-only');
            END;
            "#,
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_exceptions_tenant_id ON exceptions(tenant_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_playbooks_tenant_id ON playbooks(tenant_id, is_active)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_playbook_steps_playbook_id ON playbook_steps(playbook_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_exception_events_exception_id ON exception_events(exception_id, event_type)",
            [],
        )?;

        info!("Database schema initialized successfully");
        Ok(())
    }

    /// Runs a transaction with the provided closure.
    ///
    /// # Arguments
    /// * `f` - Closure that performs operations within the transaction
    ///
    /// # Returns
    /// The result of the closure, or an error if the transaction fails
    ///
    /// # Errors
    /// * `StorageError::Connection` - If the transaction fails
    pub fn transaction<F, R>(&mut self, f: F) -> StorageResult<R>
    where
        F: FnOnce(&rusqlite::Transaction) -> StorageResult<R>,
    {
        let tx = self.conn.transaction()?;
        match f(&tx) {
            Ok(result) => {
                tx.commit()?;
                Ok(result)
            }
            Err(e) => {
                tx.rollback()?;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table_names(db: &Database) -> Vec<String> {
        let mut stmt =
            db.conn().prepare("SELECT name FROM sqlite_master WHERE type='table'").unwrap();
        stmt.query_map([], |row| row.get(0)).unwrap().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_database_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let tables = table_names(&db);

        assert!(tables.contains(&"exceptions".to_string()));
        assert!(tables.contains(&"playbooks".to_string()));
        assert!(tables.contains(&"playbook_steps".to_string()));
        assert!(tables.contains(&"exception_events".to_string()));
    }

    #[test]
    fn test_database_open_file_is_reopenable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("remedy.db");
        let path = path.to_str().unwrap();

        {
            let mut db = Database::open(path).unwrap();
            db.conn_mut()
                .execute(
                    "INSERT INTO exceptions (exception_id, tenant_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
                    rusqlite::params!["exc-1", "tenant-a", "2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z"],
                )
                .unwrap();
        }

        let db = Database::open(path).unwrap();
        let mut stmt = db.conn().prepare("SELECT exception_id FROM exceptions WHERE exception_id = ?").unwrap();
        assert!(stmt.exists(rusqlite::params!["exc-1"]).unwrap());
    }

    #[test]
    fn test_orphan_step_pointer_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        let result = db.conn_mut().execute(
            "INSERT INTO exceptions (exception_id, tenant_id, current_step, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            rusqlite::params!["exc-1", "tenant-a", 1, "2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z"],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_events_are_append_only() {
        let mut db = Database::open_in_memory().unwrap();
        let conn = db.conn_mut();
        conn.execute(
            "INSERT INTO exception_events (tenant_id, exception_id, event_type, actor_type, actor_id, payload_json, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params!["tenant-a", "exc-1", "PlaybookStarted", "system", "engine", "{}", "2024-01-01T00:00:00Z"],
        )
        .unwrap();

        assert!(conn.execute("UPDATE exception_events SET actor_id = 'x'", []).is_err());
        assert!(conn.execute("DELETE FROM exception_events", []).is_err());

        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM exception_events", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_steps_cascade_with_playbook() {
        let mut db = Database::open_in_memory().unwrap();
        let conn = db.conn_mut();
        conn.execute(
            "INSERT INTO playbooks (playbook_id, tenant_id, name, version, match_json, priority, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![1, "tenant-a", "Retry", 1, "{}", 10, "2024-01-01T00:00:00Z"],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO playbook_steps (step_id, playbook_id, step_order, name, action_type, params_json) VALUES (?, ?, ?, ?, ?, ?)",
            rusqlite::params!["1-1", 1, 1, "Notify", "notify", "{}"],
        )
        .unwrap();

        conn.execute("DELETE FROM playbooks WHERE playbook_id = 1", []).unwrap();

        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM playbook_steps", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_database_transaction_rollback() {
        let mut db = Database::open_in_memory().unwrap();

        let result: StorageResult<()> = db.transaction(|tx| {
            tx.execute(
                "INSERT INTO exceptions (exception_id, tenant_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
                rusqlite::params!["exc-rollback", "tenant-a", "2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z"],
            )?;
            Err(crate::storage::error::StorageError::InvalidData("Simulated error".to_string()))
        });

        assert!(result.is_err());

        let mut stmt = db.conn().prepare("SELECT exception_id FROM exceptions WHERE exception_id = ?").unwrap();
        assert!(!stmt.exists(rusqlite::params!["exc-rollback"]).unwrap());
    }
}
