//! The single global execution slot.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Capacity-one token: whoever holds the guard is the only job runner.
#[derive(Debug, Clone)]
pub struct ExecutionSlot {
    permits: Arc<Semaphore>,
}

/// Held while a job runs; dropping it frees the slot.
#[derive(Debug)]
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
}

impl Default for ExecutionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionSlot {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// Wait for the slot. Returns `None` only if the semaphore was closed.
    pub async fn acquire(&self) -> Option<SlotGuard> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .ok()
            .map(|permit| SlotGuard { _permit: permit })
    }
}
