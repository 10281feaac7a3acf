//! In-memory artifact cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{CacheError, SnapshotBackend};
use crate::metrics;
use crate::provider::{Artifact, ArtifactKey};

/// What a call to [`ArtifactCache::set`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The key was new.
    Inserted,
    /// The key existed and overwrite was not requested; nothing changed.
    Unchanged,
    /// The key existed and was replaced.
    Overwritten,
}

impl SetOutcome {
    fn label(&self) -> &'static str {
        match self {
            SetOutcome::Inserted => "inserted",
            SetOutcome::Unchanged => "unchanged",
            SetOutcome::Overwritten => "overwritten",
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub live: usize,
    pub fallback: usize,
    /// Whether there are writes not yet persisted.
    pub dirty: bool,
}

/// Shared dedup store of artifacts keyed by (item, period).
///
/// First writer wins: `set` on an existing key is a no-op unless
/// `overwrite` is true.
pub struct ArtifactCache {
    entries: RwLock<HashMap<ArtifactKey, Arc<Artifact>>>,
    backend: Option<Arc<dyn SnapshotBackend>>,
    dirty: AtomicBool,
    /// Serializes snapshot writers; backends reuse one temporary path.
    snapshot_lock: Mutex<()>,
}

impl ArtifactCache {
    /// A cache with no persistence.
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            backend: None,
            dirty: AtomicBool::new(false),
            snapshot_lock: Mutex::new(()),
        }
    }

    /// Open a cache backed by `backend`, loading whatever can be salvaged.
    ///
    /// Never fails: an unreadable snapshot leaves the cache empty and the
    /// error is logged.
    pub fn load(backend: Arc<dyn SnapshotBackend>) -> Self {
        let mut entries = HashMap::new();

        match backend.load() {
            Ok(report) => {
                for artifact in report.artifacts {
                    // Keep the first record for a key, matching set() semantics.
                    entries
                        .entry(artifact.key())
                        .or_insert_with(|| Arc::new(artifact));
                }
                if report.skipped_records > 0 {
                    warn!(
                        skipped = report.skipped_records,
                        backups = report.backups.len(),
                        "Artifact cache loaded with damaged records dropped"
                    );
                }
                info!(
                    entries = entries.len(),
                    "Loaded artifact cache from {}",
                    backend.describe()
                );
            }
            Err(e) => {
                warn!(
                    "Failed to read artifact cache from {}, starting empty: {}",
                    backend.describe(),
                    e
                );
            }
        }

        Self {
            entries: RwLock::new(entries),
            backend: Some(backend),
            dirty: AtomicBool::new(false),
            snapshot_lock: Mutex::new(()),
        }
    }

    pub fn get(&self, key: &ArtifactKey) -> Option<Arc<Artifact>> {
        self.entries.read().unwrap().get(key).cloned()
    }

    pub fn has(&self, key: &ArtifactKey) -> bool {
        self.entries.read().unwrap().contains_key(key)
    }

    /// Store an artifact under its own key.
    pub fn set(&self, artifact: Artifact, overwrite: bool) -> SetOutcome {
        let key = artifact.key();
        let outcome = {
            let mut entries = self.entries.write().unwrap();
            match entries.get(&key) {
                Some(_) if !overwrite => SetOutcome::Unchanged,
                Some(_) => {
                    entries.insert(key.clone(), Arc::new(artifact));
                    SetOutcome::Overwritten
                }
                None => {
                    entries.insert(key.clone(), Arc::new(artifact));
                    SetOutcome::Inserted
                }
            }
        };

        if outcome != SetOutcome::Unchanged {
            self.dirty.store(true, Ordering::SeqCst);
        }
        metrics::CACHE_WRITES
            .with_label_values(&[outcome.label()])
            .inc();
        debug!(item = %key.item, period = %key.period, outcome = outcome.label(), "Cache set");
        outcome
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().unwrap();
        let fallback = entries
            .values()
            .filter(|a| a.provenance.is_fallback())
            .count();
        CacheStats {
            entries: entries.len(),
            live: entries.len() - fallback,
            fallback,
            dirty: self.dirty.load(Ordering::SeqCst),
        }
    }

    /// Persist the cache if anything changed since the last snapshot.
    ///
    /// Returns whether a snapshot was written.
    pub fn snapshot(&self) -> Result<bool, CacheError> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        match self.write_snapshot() {
            Ok(written) => Ok(written),
            Err(e) => {
                self.dirty.store(true, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Persist the cache unconditionally.
    pub fn force_snapshot(&self) -> Result<bool, CacheError> {
        self.dirty.store(false, Ordering::SeqCst);
        self.write_snapshot().inspect_err(|_| {
            self.dirty.store(true, Ordering::SeqCst);
        })
    }

    fn write_snapshot(&self) -> Result<bool, CacheError> {
        let Some(backend) = &self.backend else {
            return Ok(false);
        };
        let _writer = self.snapshot_lock.lock().unwrap();

        let mut artifacts: Vec<Artifact> = self
            .entries
            .read()
            .unwrap()
            .values()
            .map(|a| a.as_ref().clone())
            .collect();
        artifacts.sort_by(|a, b| a.key().cmp(&b.key()));

        backend.save(&artifacts)?;
        debug!(entries = artifacts.len(), "Snapshot written to {}", backend.describe());
        Ok(true)
    }
}
