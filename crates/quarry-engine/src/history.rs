//! Run history persisted in a small SQLite database.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sql_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sql TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    status TEXT NOT NULL
);
";

/// File name of the history database inside the data directory.
pub const HISTORY_FILE: &str = "history.db";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to prepare history directory: {0}")]
    Io(#[from] std::io::Error),
}

/// One recorded run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub sql: String,
    pub status: String,
    pub created_at: String,
}

/// Append-only log of finished runs.
pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Open (or create) the history database at `path`.
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, HistoryError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, HistoryError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Record a finished run and return its id.
    pub fn record(&self, sql: &str, status: &str) -> Result<i64, HistoryError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sql_history (sql, status) VALUES (?1, ?2)",
            params![sql, status],
        )?;
        let id = conn.last_insert_rowid();
        tracing::debug!(id, status, "Run recorded");
        Ok(id)
    }

    /// Most recent entries first.
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, sql, status, COALESCE(created_at, '') FROM sql_history
             ORDER BY id DESC LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let entries = stmt
            .query_map(params![limit], |row| {
                Ok(HistoryEntry {
                    id: row.get(0)?,
                    sql: row.get(1)?,
                    status: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn clear(&self) -> Result<(), HistoryError> {
        self.conn.lock().execute("DELETE FROM sql_history", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_recent() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.record("SELECT 1", "successful").unwrap();
        store.record("SELEC 1", "fail").unwrap();
        store.record("SELECT * FROM big", "cancelled").unwrap();

        let entries = store.recent(2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sql, "SELECT * FROM big");
        assert_eq!(entries[0].status, "cancelled");
        assert_eq!(entries[1].status, "fail");
        assert!(!entries[0].created_at.is_empty());
    }

    #[test]
    fn test_clear() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.record("SELECT 1", "successful").unwrap();
        store.clear().unwrap();
        assert!(store.recent(10).unwrap().is_empty());
    }

    #[test]
    fn test_open_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(HISTORY_FILE);

        let id = {
            let store = HistoryStore::open(&path).unwrap();
            store.record("SELECT 2", "successful").unwrap()
        };

        let store = HistoryStore::open(&path).unwrap();
        let entries = store.recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
    }
}
