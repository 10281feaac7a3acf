//! Job records: one bulk acquisition request and its lifecycle state.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteJobStore;
pub use store::{CreateJobRequest, JobError, JobFilter, JobStore};
pub use types::{ItemOutcome, ItemStatus, Job, JobProgress, JobStatus, ProgressSnapshot};
