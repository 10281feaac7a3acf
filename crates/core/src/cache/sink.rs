//! Relational write sink for finished artifacts.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};

use super::CacheError;
use crate::item::Item;
use crate::period::Period;
use crate::provider::Artifact;

/// Durable store that downstream consumers read finished artifacts from.
///
/// Writes are upserts addressed by (item, period).
pub trait ArtifactSink: Send + Sync {
    fn upsert(&self, artifact: &Artifact) -> Result<(), CacheError>;
}

/// SQLite-backed artifact sink.
pub struct SqliteArtifactSink {
    conn: Mutex<Connection>,
}

impl SqliteArtifactSink {
    /// Open (or create) the sink in the database at `path`.
    pub fn new(path: &Path) -> Result<Self, CacheError> {
        let conn = Connection::open(path).map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory sink (useful for testing).
    pub fn in_memory() -> Result<Self, CacheError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CacheError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                item TEXT NOT NULL,
                year INTEGER NOT NULL,
                quarter INTEGER NOT NULL,
                payload TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                provenance TEXT NOT NULL,
                retrieved_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (item, year, quarter)
            );

            CREATE INDEX IF NOT EXISTS idx_artifacts_retrieved_at ON artifacts(retrieved_at);
            "#,
        )
        .map_err(|e| CacheError::Database(e.to_string()))
    }

    /// Payload hash stored for (item, period), if any.
    pub fn stored_sha256(&self, item: &Item, period: Period) -> Result<Option<String>, CacheError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT sha256 FROM artifacts WHERE item = ? AND year = ? AND quarter = ?",
            params![item.as_str(), period.year(), period.quarter()],
            |row| row.get(0),
        );
        match result {
            Ok(sha) => Ok(Some(sha)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(CacheError::Database(e.to_string())),
        }
    }

    pub fn count(&self) -> Result<i64, CacheError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM artifacts", [], |row| row.get(0))
            .map_err(|e| CacheError::Database(e.to_string()))
    }
}

impl ArtifactSink for SqliteArtifactSink {
    fn upsert(&self, artifact: &Artifact) -> Result<(), CacheError> {
        let provenance = serde_json::to_string(&artifact.provenance)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            INSERT INTO artifacts (item, year, quarter, payload, sha256, provenance, retrieved_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(item, year, quarter) DO UPDATE SET
                payload = excluded.payload,
                sha256 = excluded.sha256,
                provenance = excluded.provenance,
                retrieved_at = excluded.retrieved_at,
                updated_at = excluded.updated_at
            "#,
            params![
                artifact.item.as_str(),
                artifact.period.year(),
                artifact.period.quarter(),
                artifact.payload,
                artifact.sha256,
                provenance,
                artifact.retrieved_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(())
    }
}
