//! Durable per-job record of settled items.
//!
//! The checkpoint is written independently of the job record so a restarted
//! job can compute its remaining items without trusting in-memory state.

mod sqlite_store;

pub use sqlite_store::SqliteCheckpointStore;

use std::collections::HashSet;

use thiserror::Error;

use crate::item::Item;
use crate::job::ItemOutcome;

/// Errors from checkpoint persistence.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint database error: {0}")]
    Database(String),

    #[error("checkpoint serialization error: {0}")]
    Serialization(String),
}

/// Everything recorded for one job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Checkpoint {
    /// Items with a success or skip outcome.
    pub done_items: HashSet<Item>,
    /// Every terminal outcome, failures included, in the order recorded.
    pub results: Vec<ItemOutcome>,
}

impl Checkpoint {
    pub fn is_done(&self, item: &Item) -> bool {
        self.done_items.contains(item)
    }

    /// True when `item` has any terminal outcome.
    pub fn is_settled(&self, item: &Item) -> bool {
        self.results.iter().any(|outcome| &outcome.item == item)
    }

    /// Items of `items` without an outcome yet, in their original order.
    pub fn remaining(&self, items: &[Item]) -> Vec<Item> {
        items
            .iter()
            .filter(|item| !self.is_settled(item))
            .cloned()
            .collect()
    }
}

/// Storage for job checkpoints.
///
/// Every terminal outcome is stored, keyed by item. Only outcomes for which
/// [`ItemOutcome::is_done`] holds count towards `done_items`.
pub trait CheckpointStore: Send + Sync {
    /// Record one settled item.
    fn record_done(&self, job_id: &str, outcome: &ItemOutcome) -> Result<(), CheckpointError>;

    /// Record a batch of outcomes atomically.
    fn record_batch(&self, job_id: &str, outcomes: &[ItemOutcome]) -> Result<(), CheckpointError>;

    /// Load the checkpoint of a job. Unknown jobs have an empty checkpoint.
    fn load(&self, job_id: &str) -> Result<Checkpoint, CheckpointError>;

    /// Drop everything recorded for a job.
    fn clear(&self, job_id: &str) -> Result<(), CheckpointError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Period;

    #[test]
    fn test_remaining_preserves_order() {
        let items: Vec<Item> = ["A", "B", "C", "D"]
            .iter()
            .map(|s| Item::parse(s).unwrap())
            .collect();
        let mut checkpoint = Checkpoint::default();
        checkpoint.done_items.insert(items[1].clone());
        checkpoint.results.push(ItemOutcome::skipped(
            items[1].clone(),
            Period::new(2025, 1).unwrap(),
        ));
        checkpoint
            .results
            .push(ItemOutcome::failed(items[3].clone(), "exhausted", 2));

        let remaining = checkpoint.remaining(&items);
        assert_eq!(remaining, vec![items[0].clone(), items[2].clone()]);
        assert!(checkpoint.is_settled(&items[3]));
        assert!(!checkpoint.is_done(&items[3]));
    }
}
