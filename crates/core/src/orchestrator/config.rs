//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::retry::BackoffPolicy;

/// Configuration for the job orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Enable/disable the background scheduling loop.
    /// When disabled, jobs are accepted but stay pending.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// How often to poll for pending jobs (milliseconds).
    /// Job creation and resume also wake the loop immediately.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Items per batch (B). Progress advances once per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Items fetched concurrently within a batch (W, at most B).
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Pause between two batches (milliseconds).
    #[serde(default = "default_inter_batch_delay")]
    pub inter_batch_delay_ms: u64,

    /// Retries of the same candidate on rate limiting or transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay (milliseconds); doubles on every further retry.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single retry delay (milliseconds).
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,

    /// Candidate periods per item when a job does not list its own.
    #[serde(default = "default_horizon")]
    pub horizon: usize,

    /// Snapshot the artifact cache every N batches (0 = only at job end).
    #[serde(default = "default_snapshot_every")]
    pub snapshot_every_batches: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    2000 // 2 seconds
}

fn default_batch_size() -> usize {
    10
}

fn default_max_concurrent_fetches() -> usize {
    3
}

fn default_inter_batch_delay() -> u64 {
    1000 // 1 second
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    500
}

fn default_backoff_max() -> u64 {
    30_000
}

fn default_horizon() -> usize {
    4
}

fn default_snapshot_every() -> usize {
    5
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            poll_interval_ms: default_poll_interval(),
            batch_size: default_batch_size(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            inter_batch_delay_ms: default_inter_batch_delay(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
            horizon: default_horizon(),
            snapshot_every_batches: default_snapshot_every(),
        }
    }
}

impl OrchestratorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    /// Worker bound clamped into `1..=batch_size`.
    pub fn worker_bound(&self) -> usize {
        self.max_concurrent_fetches.clamp(1, self.batch_size.max(1))
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::exponential(
            self.max_retries,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }
}
