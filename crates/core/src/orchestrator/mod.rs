//! Job orchestrator for bulk acquisition.
//!
//! The orchestrator drives jobs through their state machine:
//! - **Scheduling**: one job at a time holds the global execution slot
//! - **Batches**: remaining items are processed in fixed-size batches with a
//!   bounded number of concurrent workers and a delay between batches
//! - **Items**: candidate periods are tried in order with retry/backoff

mod config;
mod retry;
mod runner;
mod slot;
mod types;
mod worker;

pub use config::OrchestratorConfig;
pub use retry::BackoffPolicy;
pub use runner::JobOrchestrator;
pub use slot::{ExecutionSlot, SlotGuard};
pub use types::{OrchestratorError, OrchestratorStatus, ProgressEvent, ProgressEventKind};
pub use worker::{ItemWorker, WorkerOutcome};
