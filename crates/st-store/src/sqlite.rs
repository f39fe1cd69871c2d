//! SQLite key-value backend.
//!
//! # Thread Safety
//!
//! [`SqliteKv`] wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Several recorder processes may open the same file; SQLite serializes their
//! writes, and a busy timeout turns short lock contention into waiting instead
//! of errors.
//!
//! # Schema
//!
//! A single table `kv(key, value, updated_at)`. Values are JSON text and
//! `updated_at` is an ISO 8601 UTC timestamp (e.g. `2025-01-15T10:30:00.000Z`).

use std::path::Path;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::{KvStore, StoreError};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`KvStore`] in a SQLite database file.
#[derive(Debug)]
pub struct SqliteKv {
    conn: Connection,
}

impl SqliteKv {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is initialized on first open.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let kv = Self { conn };
        kv.init()?;
        Ok(kv)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let kv = Self { conn };
        kv.init()?;
        Ok(kv)
    }

    /// Initializes the schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), StoreError> {
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }
}

impl KvStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.conn.execute(
            "
            INSERT INTO kv (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
            params![key, value, updated_at],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?", [key])?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT key
            FROM kv
            WHERE substr(key, 1, length(?1)) = ?1
            ORDER BY key ASC
            ",
        )?;
        let rows = stmt.query_map([prefix], |row| row.get(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_database() {
        let kv = SqliteKv::open_in_memory().expect("open in-memory db");
        assert_eq!(kv.get("missing").unwrap(), None);
    }

    #[test]
    fn set_overwrites_and_remove_deletes() {
        let kv = SqliteKv::open_in_memory().unwrap();
        kv.set("summary_all", "1").unwrap();
        kv.set("summary_all", "2").unwrap();
        assert_eq!(kv.get("summary_all").unwrap().as_deref(), Some("2"));
        kv.remove("summary_all").unwrap();
        assert_eq!(kv.get("summary_all").unwrap(), None);
    }

    #[test]
    fn prefix_match_treats_underscore_literally() {
        let kv = SqliteKv::open_in_memory().unwrap();
        for key in ["study_2025_W03", "studyX2025", "study_2025_W01", "summary_all"] {
            kv.set(key, "{}").unwrap();
        }
        assert_eq!(
            kv.keys_with_prefix("study_").unwrap(),
            vec!["study_2025_W01", "study_2025_W03"]
        );
    }

    #[test]
    fn data_survives_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("st.db");
        {
            let kv = SqliteKv::open(&path).unwrap();
            kv.set("index_videos", "{}").unwrap();
        }
        let kv = SqliteKv::open(&path).unwrap();
        assert_eq!(kv.get("index_videos").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn updated_at_is_recorded() {
        let kv = SqliteKv::open_in_memory().unwrap();
        kv.set("summary_all", "{}").unwrap();
        let updated_at: String = kv
            .conn
            .query_row(
                "SELECT updated_at FROM kv WHERE key = 'summary_all'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(updated_at.ends_with('Z'));
    }
}
