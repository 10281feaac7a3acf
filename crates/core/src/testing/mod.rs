//! Testing utilities and mock implementations.
//!
//! This module provides a scripted document provider and a failing checkpoint
//! store, allowing orchestrator runs to be exercised end to end without a
//! network or a flaky disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use harvester_core::testing::{fixtures, MockProvider, MockResponse};
//!
//! let provider = MockProvider::new();
//! provider.script(
//!     &fixtures::item("MSFT"),
//!     fixtures::period(2025, 2),
//!     vec![MockResponse::document("body")],
//! );
//! ```

mod failing_checkpoint;
mod mock_provider;

pub use failing_checkpoint::FailingCheckpointStore;
pub use mock_provider::{MockProvider, MockResponse, RecordedFetch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::item::Item;
    use crate::orchestrator::OrchestratorConfig;
    use crate::period::Period;
    use crate::provider::Artifact;

    /// Parse an item, panicking on invalid input.
    pub fn item(raw: &str) -> Item {
        Item::parse(raw).unwrap()
    }

    /// Parse a list of items.
    pub fn items(raw: &[&str]) -> Vec<Item> {
        raw.iter().map(|s| item(s)).collect()
    }

    /// Build a period, panicking on an invalid quarter.
    pub fn period(year: i32, quarter: u8) -> Period {
        Period::new(year, quarter).unwrap()
    }

    /// A live artifact from the mock provider.
    pub fn live_artifact(item_id: &str, period: Period, payload: &str) -> Artifact {
        Artifact::live(item(item_id), period, payload.to_string(), "mock")
    }

    /// Orchestrator settings with millisecond timings, suitable for tests.
    pub fn fast_orchestrator_config() -> OrchestratorConfig {
        OrchestratorConfig {
            enabled: true,
            poll_interval_ms: 20,
            batch_size: 2,
            max_concurrent_fetches: 2,
            inter_batch_delay_ms: 5,
            max_retries: 2,
            backoff_base_ms: 1,
            backoff_max_ms: 5,
            horizon: 2,
            snapshot_every_batches: 1,
        }
    }
}
