//! Checkpoint store that fails on demand.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::checkpoint::{Checkpoint, CheckpointError, CheckpointStore, SqliteCheckpointStore};
use crate::job::ItemOutcome;

/// In-memory checkpoint store whose writes start failing after a number of
/// successful batch writes.
pub struct FailingCheckpointStore {
    inner: SqliteCheckpointStore,
    writes_left: AtomicUsize,
}

impl FailingCheckpointStore {
    /// Fail every write.
    pub fn new() -> Result<Self, CheckpointError> {
        Self::fail_after(0)
    }

    /// Allow `writes` successful writes, then fail.
    pub fn fail_after(writes: usize) -> Result<Self, CheckpointError> {
        Ok(Self {
            inner: SqliteCheckpointStore::in_memory()?,
            writes_left: AtomicUsize::new(writes),
        })
    }

    fn take_write(&self) -> Result<(), CheckpointError> {
        self.writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .map(|_| ())
            .map_err(|_| CheckpointError::Database("disk I/O error (simulated)".to_string()))
    }
}

impl CheckpointStore for FailingCheckpointStore {
    fn record_done(&self, job_id: &str, outcome: &ItemOutcome) -> Result<(), CheckpointError> {
        self.take_write()?;
        self.inner.record_done(job_id, outcome)
    }

    fn record_batch(&self, job_id: &str, outcomes: &[ItemOutcome]) -> Result<(), CheckpointError> {
        self.take_write()?;
        self.inner.record_batch(job_id, outcomes)
    }

    fn load(&self, job_id: &str) -> Result<Checkpoint, CheckpointError> {
        self.inner.load(job_id)
    }

    fn clear(&self, job_id: &str) -> Result<(), CheckpointError> {
        self.inner.clear(job_id)
    }
}
