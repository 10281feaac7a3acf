//! Snapshot backends for the artifact cache.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use super::CacheError;
use crate::provider::Artifact;

/// Result of loading a snapshot.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Records that parsed cleanly, in file order.
    pub artifacts: Vec<Artifact>,
    /// Records that could not be parsed and were dropped.
    pub skipped_records: usize,
    /// Copies made of damaged files.
    pub backups: Vec<PathBuf>,
}

/// Durable storage for the full set of cached artifacts.
pub trait SnapshotBackend: Send + Sync {
    /// Load every salvageable record. A missing snapshot is an empty one.
    fn load(&self) -> Result<LoadReport, CacheError>;

    /// Replace the stored snapshot with `artifacts`.
    fn save(&self, artifacts: &[Artifact]) -> Result<(), CacheError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Parse JSON-lines content, skipping lines that do not decode.
fn parse_records(contents: &str) -> (Vec<Artifact>, usize) {
    let mut artifacts = Vec::new();
    let mut skipped = 0;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Artifact>(line) {
            Ok(artifact) => artifacts.push(artifact),
            Err(_) => skipped += 1,
        }
    }
    (artifacts, skipped)
}

/// Copy a damaged file next to itself with a timestamped `.bak` suffix.
fn backup_file(path: &Path) -> Result<PathBuf, CacheError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    let backup = path.with_file_name(format!(
        "{}.{}.bak",
        file_name,
        Utc::now().format("%Y%m%dT%H%M%S%.3f")
    ));
    fs::copy(path, &backup).map_err(|e| CacheError::io(&backup, e))?;
    Ok(backup)
}

/// Read one snapshot file into `report`, backing it up if any record is bad.
fn load_file_into(path: &Path, report: &mut LoadReport) -> Result<(), CacheError> {
    let bytes = fs::read(path).map_err(|e| CacheError::io(path, e))?;
    let contents = String::from_utf8_lossy(&bytes);
    let (artifacts, skipped) = parse_records(&contents);

    if skipped > 0 {
        warn!(
            path = %path.display(),
            skipped,
            salvaged = artifacts.len(),
            "Snapshot contains unparsable records"
        );
        match backup_file(path) {
            Ok(backup) => {
                warn!(backup = %backup.display(), "Copied damaged snapshot aside");
                report.backups.push(backup);
            }
            Err(e) => warn!("Failed to back up damaged snapshot: {}", e),
        }
    }

    report.skipped_records += skipped;
    report.artifacts.extend(artifacts);
    Ok(())
}

fn encode_records(artifacts: &[Artifact]) -> Result<Vec<u8>, CacheError> {
    let mut buf = Vec::new();
    for artifact in artifacts {
        serde_json::to_writer(&mut buf, artifact)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        buf.push(b'\n');
    }
    Ok(buf)
}

/// Write `bytes` to `path` through a temporary file and a rename.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }
    }
    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp).map_err(|e| CacheError::io(&tmp, e))?;
        file.write_all(bytes).map_err(|e| CacheError::io(&tmp, e))?;
        file.sync_all().map_err(|e| CacheError::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| CacheError::io(path, e))
}

/// Whole cache in a single JSON-lines file.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotBackend for FileSnapshot {
    fn load(&self) -> Result<LoadReport, CacheError> {
        let mut report = LoadReport::default();
        if !self.path.exists() {
            return Ok(report);
        }
        load_file_into(&self.path, &mut report)?;
        Ok(report)
    }

    fn save(&self, artifacts: &[Artifact]) -> Result<(), CacheError> {
        write_atomically(&self.path, &encode_records(artifacts)?)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Cache sharded into `chunk-NNNNN.jsonl` files of at most `chunk_size`
/// records, reloaded in index order and concatenated.
#[derive(Debug, Clone)]
pub struct ChunkedSnapshot {
    dir: PathBuf,
    chunk_size: usize,
}

impl ChunkedSnapshot {
    pub fn new(dir: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            dir: dir.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    fn chunk_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("chunk-{:05}.jsonl", index))
    }

    /// Existing chunk files sorted by index.
    fn chunk_files(&self) -> Result<Vec<(usize, PathBuf)>, CacheError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| CacheError::io(&self.dir, e))?;
        let mut chunks = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let index = name
                .strip_prefix("chunk-")
                .and_then(|rest| rest.strip_suffix(".jsonl"))
                .and_then(|digits| digits.parse::<usize>().ok());
            if let Some(index) = index {
                chunks.push((index, entry.path()));
            }
        }
        chunks.sort_by_key(|(index, _)| *index);
        Ok(chunks)
    }
}

impl SnapshotBackend for ChunkedSnapshot {
    fn load(&self) -> Result<LoadReport, CacheError> {
        let mut report = LoadReport::default();
        if !self.dir.exists() {
            return Ok(report);
        }
        for (_, path) in self.chunk_files()? {
            if let Err(e) = load_file_into(&path, &mut report) {
                warn!("Skipping unreadable chunk {}: {}", path.display(), e);
            }
        }
        Ok(report)
    }

    fn save(&self, artifacts: &[Artifact]) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|e| CacheError::io(&self.dir, e))?;

        let mut written = 0;
        for (index, chunk) in artifacts.chunks(self.chunk_size).enumerate() {
            write_atomically(&self.chunk_path(index), &encode_records(chunk)?)?;
            written = index + 1;
        }

        // Drop chunks left over from a previous, larger snapshot.
        for (index, path) in self.chunk_files()? {
            if index >= written {
                fs::remove_file(&path).map_err(|e| CacheError::io(&path, e))?;
            }
        }

        info!(
            dir = %self.dir.display(),
            chunks = written,
            records = artifacts.len(),
            "Wrote chunked snapshot"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "chunk directory {} ({} per chunk)",
            self.dir.display(),
            self.chunk_size
        )
    }
}
