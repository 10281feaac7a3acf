//! Types for the job orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::job::{JobError, ProgressSnapshot};

/// Errors that can occur during orchestration.
///
/// Store errors raised while a job runs are fatal for that job.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Job not found.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Job store error.
    #[error("job store error: {0}")]
    JobStore(#[from] JobError),

    /// Checkpoint store error.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// What happened to the job a [`ProgressEvent`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventKind {
    Created,
    Started,
    BatchFinished,
    Paused,
    Resumed,
    Cancelled,
    Completed,
    Failed,
}

/// Notification published on every job state or progress change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub kind: ProgressEventKind,
    pub snapshot: ProgressSnapshot,
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether the scheduling loop is running.
    pub running: bool,
    /// Job holding the execution slot, if any.
    pub active_job: Option<String>,
    /// Jobs waiting for the slot.
    pub pending_count: usize,
    /// Jobs currently running (0 or 1).
    pub running_count: usize,
    /// Jobs paused.
    pub paused_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_status_default() {
        let status = OrchestratorStatus::default();
        assert!(!status.running);
        assert!(status.active_job.is_none());
        assert_eq!(status.pending_count, 0);
    }

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::JobNotFound("job-456".to_string());
        assert_eq!(err.to_string(), "job not found: job-456");

        let err = OrchestratorError::from(CheckpointError::Database("disk full".to_string()));
        assert_eq!(
            err.to_string(),
            "checkpoint error: checkpoint database error: disk full"
        );
    }

    #[test]
    fn test_event_kind_serialization() {
        let json = serde_json::to_string(&ProgressEventKind::BatchFinished).unwrap();
        assert_eq!(json, "\"batch_finished\"");
    }
}
