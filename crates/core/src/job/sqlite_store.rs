//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection};

use super::{
    CreateJobRequest, ItemOutcome, Job, JobError, JobFilter, JobProgress, JobStatus, JobStore,
};

const JOB_COLUMNS: &str = "id, status, priority, items, periods, force_refresh, progress, results, error, created_at, started_at, completed_at, updated_at";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, JobError> {
        let conn = Connection::open(path).map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobError> {
        let conn = Connection::open_in_memory().map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                items TEXT NOT NULL,
                periods TEXT,
                force_refresh INTEGER NOT NULL DEFAULT 0,
                progress TEXT NOT NULL,
                results TEXT NOT NULL,
                error TEXT,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_queue ON jobs(status, priority DESC, created_at ASC);
            "#,
        )
        .map_err(|e| JobError::Database(e.to_string()))
    }

    fn build_where_clause(filter: &JobFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        let where_clause = match filter.status {
            Some(status) => {
                params.push(Box::new(status.as_str()));
                "WHERE status = ?".to_string()
            }
            None => String::new(),
        };
        (where_clause, params)
    }

    fn parse_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, value: &str) -> rusqlite::Result<T> {
        serde_json::from_str(value)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let status_str: String = row.get(1)?;
        let status = JobStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                Type::Text,
                format!("unknown job status: {}", status_str).into(),
            )
        })?;
        let items_json: String = row.get(3)?;
        let periods_json: Option<String> = row.get(4)?;
        let progress_json: String = row.get(6)?;
        let results_json: String = row.get(7)?;
        let created_at: String = row.get(9)?;
        let started_at: Option<String> = row.get(10)?;
        let completed_at: Option<String> = row.get(11)?;
        let updated_at: String = row.get(12)?;

        Ok(Job {
            id: row.get(0)?,
            status,
            priority: row.get(2)?,
            items: Self::parse_json(3, &items_json)?,
            periods: periods_json
                .map(|json| Self::parse_json(4, &json))
                .transpose()?,
            force_refresh: row.get(5)?,
            progress: Self::parse_json(6, &progress_json)?,
            results: Self::parse_json(7, &results_json)?,
            error: row.get(8)?,
            created_at: Self::parse_time(&created_at),
            started_at: started_at.as_deref().map(Self::parse_time),
            completed_at: completed_at.as_deref().map(Self::parse_time),
            updated_at: Self::parse_time(&updated_at),
        })
    }

    fn load(conn: &Connection, id: &str) -> Result<Option<Job>, JobError> {
        let result = conn.query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS),
            params![id],
            Self::row_to_job,
        );
        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(JobError::Database(e.to_string())),
        }
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JobError> {
        serde_json::to_string(value).map_err(|e| JobError::Database(e.to_string()))
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, request: CreateJobRequest) -> Result<Job, JobError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let progress = JobProgress::new(request.items.len());

        conn.execute(
            &format!(
                "INSERT INTO jobs ({}) VALUES (?, ?, 0, ?, ?, ?, ?, '[]', NULL, ?, NULL, NULL, ?)",
                JOB_COLUMNS
            ),
            params![
                id,
                JobStatus::Pending.as_str(),
                Self::to_json(&request.items)?,
                request.periods.as_ref().map(Self::to_json).transpose()?,
                request.force_refresh,
                Self::to_json(&progress)?,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(Job {
            id,
            items: request.items,
            periods: request.periods,
            force_refresh: request.force_refresh,
            status: JobStatus::Pending,
            priority: 0,
            progress,
            results: Vec::new(),
            error: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<Job>, JobError> {
        let conn = self.conn.lock().unwrap();
        Self::load(&conn, id)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM jobs {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            JOB_COLUMNS, where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_job)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row.map_err(|e| JobError::Database(e.to_string()))?);
        }
        Ok(jobs)
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| JobError::Database(e.to_string()))
    }

    fn next_pending(&self) -> Result<Option<Job>, JobError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            &format!(
                "SELECT {} FROM jobs WHERE status = 'pending' ORDER BY priority DESC, created_at ASC, rowid ASC LIMIT 1",
                JOB_COLUMNS
            ),
            [],
            Self::row_to_job,
        );
        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(JobError::Database(e.to_string())),
        }
    }

    fn transition(
        &self,
        id: &str,
        from: &[JobStatus],
        to: JobStatus,
        error: Option<String>,
    ) -> Result<Option<Job>, JobError> {
        let conn = self.conn.lock().unwrap();

        let current = Self::load(&conn, id)?.ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if !from.contains(&current.status) || !current.status.can_transition_to(to) {
            return Ok(None);
        }

        let now = Utc::now();
        let started_at = match (to, current.started_at) {
            (JobStatus::Running, None) => Some(now),
            (_, existing) => existing,
        };
        let completed_at = if to.is_terminal() {
            Some(now)
        } else {
            current.completed_at
        };
        let error = error.or(current.error);

        conn.execute(
            "UPDATE jobs SET status = ?, error = ?, started_at = ?, completed_at = ?, updated_at = ? WHERE id = ?",
            params![
                to.as_str(),
                error,
                started_at.map(|t| t.to_rfc3339()),
                completed_at.map(|t| t.to_rfc3339()),
                now.to_rfc3339(),
                id,
            ],
        )
        .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(Some(Job {
            status: to,
            error,
            started_at,
            completed_at,
            updated_at: now,
            ..current
        }))
    }

    fn requeue_front(&self, id: &str) -> Result<bool, JobError> {
        let conn = self.conn.lock().unwrap();

        let current = Self::load(&conn, id)?.ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if current.status != JobStatus::Paused {
            return Ok(false);
        }

        let top: i64 = conn
            .query_row("SELECT COALESCE(MAX(priority), 0) FROM jobs", [], |row| {
                row.get(0)
            })
            .map_err(|e| JobError::Database(e.to_string()))?;

        conn.execute(
            "UPDATE jobs SET status = ?, priority = ?, updated_at = ? WHERE id = ?",
            params![
                JobStatus::Pending.as_str(),
                top + 1,
                Utc::now().to_rfc3339(),
                id
            ],
        )
        .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(true)
    }

    fn save_progress(
        &self,
        id: &str,
        progress: &JobProgress,
        results: &[ItemOutcome],
    ) -> Result<(), JobError> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE jobs SET progress = ?, results = ?, updated_at = ? WHERE id = ?",
                params![
                    Self::to_json(progress)?,
                    Self::to_json(&results)?,
                    Utc::now().to_rfc3339(),
                    id
                ],
            )
            .map_err(|e| JobError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(JobError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn reset_interrupted(&self) -> Result<Vec<String>, JobError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| JobError::Database(e.to_string()))?;

        let ids = {
            let mut stmt = tx
                .prepare("SELECT id FROM jobs WHERE status IN ('running', 'paused')")
                .map_err(|e| JobError::Database(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| JobError::Database(e.to_string()))?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row.map_err(|e| JobError::Database(e.to_string()))?);
            }
            ids
        };

        tx.execute(
            "UPDATE jobs SET status = 'pending', updated_at = ? WHERE status IN ('running', 'paused')",
            params![Utc::now().to_rfc3339()],
        )
        .map_err(|e| JobError::Database(e.to_string()))?;
        tx.commit().map_err(|e| JobError::Database(e.to_string()))?;

        Ok(ids)
    }

    fn delete(&self, id: &str) -> Result<Job, JobError> {
        let conn = self.conn.lock().unwrap();

        let job = Self::load(&conn, id)?.ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if job.status == JobStatus::Running {
            return Err(JobError::InvalidState {
                job_id: id.to_string(),
                current_state: job.status.as_str().to_string(),
                operation: "delete".to_string(),
            });
        }

        conn.execute("DELETE FROM jobs WHERE id = ?", params![id])
            .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(job)
    }
}
