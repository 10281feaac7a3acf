//! Core job data types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::Item;
use crate::period::Period;
use crate::provider::Provenance;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for the execution slot.
    Pending,
    /// Holding the execution slot.
    Running,
    /// Stopped at a batch boundary; resumable.
    Paused,
    /// Every item reached a terminal outcome.
    Completed,
    /// Aborted by an orchestrator-internal fault.
    Failed,
    /// Cancelled by request.
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "paused" => Some(JobStatus::Paused),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Returns true if the job can be cancelled from this state.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Legal transitions of the job state machine.
    ///
    /// A paused job is resumed by re-queueing it as pending, or completes
    /// directly when the pause landed after its last item settled. Resetting
    /// interrupted jobs at startup bypasses this table.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Paused, Pending)
                | (Paused, Completed)
                | (Paused, Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal per-item outcome kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Success,
    Failed,
    /// Already cached; nothing fetched.
    Skipped,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Success => "success",
            ItemStatus::Failed => "failed",
            ItemStatus::Skipped => "skipped",
        }
    }
}

/// Result-log entry for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub item: Item,
    pub status: ItemStatus,
    /// Period the artifact was found (or cached) for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    /// Fetch calls issued for this item.
    pub attempts: u32,
    /// Last error reason when the item failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl ItemOutcome {
    pub fn success(item: Item, period: Period, provenance: Provenance, attempts: u32) -> Self {
        Self {
            item,
            status: ItemStatus::Success,
            period: Some(period),
            provenance: Some(provenance),
            attempts,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn skipped(item: Item, period: Period) -> Self {
        Self {
            item,
            status: ItemStatus::Skipped,
            period: Some(period),
            provenance: None,
            attempts: 0,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(item: Item, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            item,
            status: ItemStatus::Failed,
            period: None,
            provenance: None,
            attempts,
            error: Some(error.into()),
            finished_at: Utc::now(),
        }
    }

    /// Successes and skips; these make up a checkpoint's done set.
    pub fn is_done(&self) -> bool {
        matches!(self.status, ItemStatus::Success | ItemStatus::Skipped)
    }
}

/// Progress counters for a job.
///
/// `current` counts processed plus failed items. Skipped items are listed
/// separately and do not advance `current`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub current: usize,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_item: Option<Item>,
    pub processed: Vec<Item>,
    pub failed: Vec<Item>,
    pub skipped: Vec<Item>,
}

impl JobProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Fold one terminal outcome into the counters.
    pub fn record(&mut self, outcome: &ItemOutcome) {
        let item = outcome.item.clone();
        match outcome.status {
            ItemStatus::Success => self.processed.push(item),
            ItemStatus::Failed => self.failed.push(item),
            ItemStatus::Skipped => self.skipped.push(item),
        }
        self.current = self.processed.len() + self.failed.len();
    }

    /// Items with a terminal outcome.
    pub fn settled(&self) -> usize {
        self.processed.len() + self.failed.len() + self.skipped.len()
    }
}

/// One bulk acquisition request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub items: Vec<Item>,
    /// Explicit candidate periods; `None` uses the resolver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periods: Option<Vec<Period>>,
    pub force_refresh: bool,
    pub status: JobStatus,
    /// Queue ordering among pending jobs (higher first).
    pub priority: i64,
    pub progress: JobProgress,
    pub results: Vec<ItemOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            job_id: self.id.clone(),
            status: self.status,
            current: self.progress.current,
            total: self.progress.total,
            current_item: self.progress.current_item.clone(),
            processed: self.progress.processed.clone(),
            failed: self.progress.failed.clone(),
            skipped: self.progress.skipped.clone(),
            error: self.error.clone(),
        }
    }
}

/// Read-only progress view returned to pollers and subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub current: usize,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_item: Option<Item>,
    pub processed: Vec<Item>,
    pub failed: Vec<Item>,
    pub skipped: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
