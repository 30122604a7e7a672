//! SQLite-based task storage.
//!
//! Provides persistent storage for:
//! - Tasks, one JSON document per row, in collection order
//! - Key-value store for application state

use std::path::Path;

use rusqlite::{params, Connection};

use super::{data_dir, Config, Settings, TaskStore};
use crate::error::{DatabaseError, Result};
use crate::task::Task;

const SCHEMA_VERSION: &str = "1";

/// SQLite database for task storage.
pub struct Database {
    conn: Connection,
    settings: Settings,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/focusroom/focusroom.db`, with
    /// settings read from the config file next to it.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated, or the
    /// config file cannot be read.
    pub fn open() -> Result<Self> {
        let settings = Config::load()?.settings();
        let path = data_dir()?.join("focusroom.db");
        Ok(Self::open_at(&path)?.with_settings(settings))
    }

    /// Open (or create) a database file with default settings.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn,
            settings: Settings::default(),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            settings: Settings::default(),
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS tasks (
                    id         TEXT PRIMARY KEY,
                    position   INTEGER NOT NULL,
                    doc        TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_tasks_position ON tasks(position);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        self.kv_set("schema_version", SCHEMA_VERSION)?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl TaskStore for Database {
    fn load_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, doc FROM tasks ORDER BY position")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut tasks = Vec::new();
        for row in rows {
            let (id, doc) = row?;
            let task: Task = serde_json::from_str(&doc).map_err(|e| DatabaseError::CorruptDocument {
                id: id.clone(),
                message: e.to_string(),
            })?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    /// Replace the stored collection in one transaction.
    fn save_tasks(&mut self, tasks: &[Task]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM tasks", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO tasks (id, position, doc, updated_at) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, task) in tasks.iter().enumerate() {
                let doc = serde_json::to_string(task)?;
                insert.execute(params![
                    task.id,
                    position as i64,
                    doc,
                    task.updated_at.to_rfc3339()
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(count = tasks.len(), "tasks saved");
        Ok(())
    }

    fn load_settings(&self) -> Result<Settings> {
        Ok(self.settings)
    }
}
