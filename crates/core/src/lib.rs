pub mod cache;
pub mod checkpoint;
pub mod config;
pub mod item;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod period;
pub mod provider;
pub mod testing;

pub use cache::{
    ArtifactCache, ArtifactSink, CacheError, CacheStats, ChunkedSnapshot, FileSnapshot,
    LoadReport, SetOutcome, SnapshotBackend, SqliteArtifactSink,
};
pub use checkpoint::{Checkpoint, CheckpointError, CheckpointStore, SqliteCheckpointStore};
pub use config::{
    load_config, load_config_from_str, validate_config, CacheConfig, Config, ConfigError,
    DatabaseConfig, ProviderConfig, SanitizedConfig, ServerConfig,
};
pub use item::{parse_item_list, Item, ItemError};
pub use job::{
    CreateJobRequest, ItemOutcome, ItemStatus, Job, JobError, JobFilter, JobProgress, JobStatus,
    JobStore, ProgressSnapshot, SqliteJobStore,
};
pub use orchestrator::{
    BackoffPolicy, ExecutionSlot, JobOrchestrator, OrchestratorConfig, OrchestratorError,
    OrchestratorStatus, ProgressEvent, ProgressEventKind,
};
pub use period::{Period, PeriodError, PeriodResolver};
pub use provider::{
    Artifact, ArtifactKey, DemoProvider, DocumentProvider, FallbackReason, FetchClient,
    FetchError, HttpProvider, Provenance, ProviderError, RemoteDocument,
};
