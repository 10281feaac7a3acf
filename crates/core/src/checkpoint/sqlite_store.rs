//! SQLite-backed checkpoint store.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};

use super::{Checkpoint, CheckpointError, CheckpointStore};
use crate::job::ItemOutcome;

/// SQLite-backed checkpoint store: one row per (job, item).
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointStore {
    pub fn new(path: &Path) -> Result<Self, CheckpointError> {
        let conn =
            Connection::open(path).map_err(|e| CheckpointError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, CheckpointError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CheckpointError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CheckpointError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                job_id TEXT NOT NULL,
                item TEXT NOT NULL,
                outcome TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (job_id, item)
            );
            "#,
        )
        .map_err(|e| CheckpointError::Database(e.to_string()))
    }

    fn insert(
        conn: &Connection,
        job_id: &str,
        outcome: &ItemOutcome,
    ) -> Result<(), CheckpointError> {
        let json = serde_json::to_string(outcome)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO checkpoints (job_id, item, outcome, recorded_at) VALUES (?, ?, ?, ?)",
            params![job_id, outcome.item.as_str(), json, Utc::now().to_rfc3339()],
        )
        .map_err(|e| CheckpointError::Database(e.to_string()))?;
        Ok(())
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    fn record_done(&self, job_id: &str, outcome: &ItemOutcome) -> Result<(), CheckpointError> {
        let conn = self.conn.lock().unwrap();
        Self::insert(&conn, job_id, outcome)
    }

    fn record_batch(&self, job_id: &str, outcomes: &[ItemOutcome]) -> Result<(), CheckpointError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| CheckpointError::Database(e.to_string()))?;
        for outcome in outcomes {
            Self::insert(&tx, job_id, outcome)?;
        }
        tx.commit()
            .map_err(|e| CheckpointError::Database(e.to_string()))
    }

    fn load(&self, job_id: &str) -> Result<Checkpoint, CheckpointError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT outcome FROM checkpoints WHERE job_id = ? ORDER BY rowid ASC")
            .map_err(|e| CheckpointError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![job_id], |row| row.get::<_, String>(0))
            .map_err(|e| CheckpointError::Database(e.to_string()))?;

        let mut checkpoint = Checkpoint::default();
        for row in rows {
            let json = row.map_err(|e| CheckpointError::Database(e.to_string()))?;
            let outcome: ItemOutcome = serde_json::from_str(&json)
                .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
            if outcome.is_done() {
                checkpoint.done_items.insert(outcome.item.clone());
            }
            checkpoint.results.push(outcome);
        }
        Ok(checkpoint)
    }

    fn clear(&self, job_id: &str) -> Result<(), CheckpointError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM checkpoints WHERE job_id = ?", params![job_id])
            .map_err(|e| CheckpointError::Database(e.to_string()))?;
        Ok(())
    }
}
