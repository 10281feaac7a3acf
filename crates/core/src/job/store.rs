//! Job storage trait and types.

use std::fmt;

use crate::item::{parse_item_list, Item};
use crate::job::{ItemOutcome, Job, JobProgress, JobStatus};
use crate::period::Period;

/// Error type for job operations.
#[derive(Debug)]
pub enum JobError {
    /// Job not found.
    NotFound(String),
    /// Cannot perform operation due to current state.
    InvalidState {
        job_id: String,
        current_state: String,
        operation: String,
    },
    /// The creation request was rejected.
    InvalidRequest(String),
    /// Database error.
    Database(String),
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::NotFound(id) => write!(f, "Job not found: {}", id),
            JobError::InvalidState {
                job_id,
                current_state,
                operation,
            } => write!(
                f,
                "Cannot {} job {}: current state is {}",
                operation, job_id, current_state
            ),
            JobError::InvalidRequest(msg) => write!(f, "Invalid job request: {}", msg),
            JobError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for JobError {}

/// Request to create a new job.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateJobRequest {
    /// Normalized, de-duplicated items in request order.
    pub items: Vec<Item>,
    /// Explicit candidate periods, bypassing the resolver.
    pub periods: Option<Vec<Period>>,
    /// Ignore cached artifacts and overwrite them.
    pub force_refresh: bool,
}

impl CreateJobRequest {
    /// Validate and normalize a raw request.
    pub fn new<S: AsRef<str>>(
        raw_items: &[S],
        periods: Option<Vec<Period>>,
        force_refresh: bool,
    ) -> Result<Self, JobError> {
        let items =
            parse_item_list(raw_items).map_err(|e| JobError::InvalidRequest(e.to_string()))?;
        if items.is_empty() {
            return Err(JobError::InvalidRequest("item list is empty".to_string()));
        }

        let periods = match periods {
            Some(list) => {
                let mut unique: Vec<Period> = Vec::with_capacity(list.len());
                for period in list {
                    if !unique.contains(&period) {
                        unique.push(period);
                    }
                }
                if unique.is_empty() {
                    return Err(JobError::InvalidRequest(
                        "explicit period list is empty".to_string(),
                    ));
                }
                Some(unique)
            }
            None => None,
        };

        Ok(Self {
            items,
            periods,
            force_refresh,
        })
    }
}

/// Filter for querying jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Filter by status.
    pub status: Option<JobStatus>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl JobFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by status.
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for job storage backends.
pub trait JobStore: Send + Sync {
    /// Create a new pending job.
    fn create(&self, request: CreateJobRequest) -> Result<Job, JobError>;

    /// Get a job by ID.
    fn get(&self, id: &str) -> Result<Option<Job>, JobError>;

    /// List jobs matching the filter, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError>;

    /// Count jobs matching the filter.
    fn count(&self, filter: &JobFilter) -> Result<i64, JobError>;

    /// The pending job at the head of the queue.
    fn next_pending(&self) -> Result<Option<Job>, JobError>;

    /// Move a job to `to` if its current status is one of `from` and the
    /// transition is legal.
    ///
    /// Returns the updated job, or `None` when the job was in another state.
    fn transition(
        &self,
        id: &str,
        from: &[JobStatus],
        to: JobStatus,
        error: Option<String>,
    ) -> Result<Option<Job>, JobError>;

    /// Move a paused job back to pending at the head of the queue.
    ///
    /// Returns false when the job is not paused.
    fn requeue_front(&self, id: &str) -> Result<bool, JobError>;

    /// Persist progress counters and the result log. Status is untouched.
    fn save_progress(
        &self,
        id: &str,
        progress: &JobProgress,
        results: &[ItemOutcome],
    ) -> Result<(), JobError>;

    /// Reset every running or paused job to pending. Returns their IDs.
    fn reset_interrupted(&self) -> Result<Vec<String>, JobError>;

    /// Permanently delete a job. Running jobs cannot be deleted.
    fn delete(&self, id: &str) -> Result<Job, JobError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_normalizes_items() {
        let request = CreateJobRequest::new(&["aapl", "MSFT", "Aapl"], None, false).unwrap();
        let names: Vec<&str> = request.items.iter().map(Item::as_str).collect();
        assert_eq!(names, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_request_rejects_empty_and_invalid() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            CreateJobRequest::new(&empty, None, false),
            Err(JobError::InvalidRequest(_))
        ));
        assert!(matches!(
            CreateJobRequest::new(&["ok", "not ok"], None, false),
            Err(JobError::InvalidRequest(_))
        ));
        assert!(matches!(
            CreateJobRequest::new(&["ok"], Some(vec![]), false),
            Err(JobError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_request_dedups_periods_in_order() {
        let p1 = Period::new(2025, 1).unwrap();
        let p2 = Period::new(2024, 4).unwrap();
        let request = CreateJobRequest::new(&["A"], Some(vec![p1, p2, p1]), true).unwrap();
        assert_eq!(request.periods, Some(vec![p1, p2]));
        assert!(request.force_refresh);
    }

    #[test]
    fn test_error_display() {
        let err = JobError::InvalidState {
            job_id: "j1".to_string(),
            current_state: "running".to_string(),
            operation: "delete".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot delete job j1: current state is running");
    }
}
