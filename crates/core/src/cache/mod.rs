//! Artifact cache: write-once store of fetched artifacts keyed by (item, period).
//!
//! The in-memory [`ArtifactCache`] is persisted through a [`SnapshotBackend`]:
//! either one JSON-lines file or a directory of fixed-size numbered chunks.
//! Loading is tolerant: unparsable records are skipped and the damaged file is
//! copied aside before the cache is used.
//!
//! Finished artifacts are additionally written to an [`ArtifactSink`] (the
//! relational store that downstream consumers read from).

mod sink;
mod snapshot;
mod store;

pub use sink::{ArtifactSink, SqliteArtifactSink};
pub use snapshot::{ChunkedSnapshot, FileSnapshot, LoadReport, SnapshotBackend};
pub use store::{ArtifactCache, CacheStats, SetOutcome};

use std::path::PathBuf;

use thiserror::Error;

/// Errors from cache persistence.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database error: {0}")]
    Database(String),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}
