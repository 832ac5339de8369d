//! File change tracking for incremental generation.
//!
//! Each tracked path has a [`FileRecord`] holding its modification time
//! and a `blake3` digest of its content. A path counts as changed when
//! it is new, missing, or either value differs from the record.
//!
//! Records can be persisted to a JSON sidecar. Loading and saving never
//! fail the caller: errors are logged, kept as diagnostics, and the
//! tracker carries on with whatever it has in memory.

use serde::{Deserialize, Serialize};
use shapecheck_ir::{Diagnostic, DiagnosticKind};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

const SIDECAR_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CacheIoError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("corrupt file cache {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("file cache {path} has unsupported version {found}")]
    Version { path: PathBuf, found: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    /// Modification time, nanoseconds since the Unix epoch.
    pub modified: u64,
    /// Hex `blake3` digest of the content.
    pub digest: String,
}

/// Why a path was reported as changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    New,
    Modified,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Changed(ChangeReason),
    Unchanged,
}

impl FileStatus {
    pub fn is_changed(self) -> bool {
        matches!(self, FileStatus::Changed(_))
    }
}

#[derive(Serialize, Deserialize)]
struct Sidecar {
    version: u32,
    files: Vec<FileRecord>,
}

#[derive(Debug, Default)]
pub struct FileTracker {
    records: BTreeMap<PathBuf, FileRecord>,
    store: Option<PathBuf>,
    diagnostics: Vec<Diagnostic>,
}

impl FileTracker {
    /// Tracker with no persistence.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Tracker persisted at `store`. Existing records are loaded now; a
    /// missing sidecar is simply empty, any other failure is logged.
    pub fn open(store: impl Into<PathBuf>) -> Self {
        let store = store.into();
        let mut tracker = Self {
            store: Some(store.clone()),
            ..Self::default()
        };
        if !store.exists() {
            return tracker;
        }
        match load_records(&store) {
            Ok(records) => {
                tracing::debug!(path = %store.display(), count = records.len(), "loaded file cache");
                tracker.records = records
                    .into_iter()
                    .map(|r| (r.path.clone(), r))
                    .collect();
            }
            Err(err) => {
                tracing::warn!("{err}; starting with an empty file cache");
                tracker.record_failure(&err);
            }
        }
        tracker
    }

    /// Compare `path` against its record, creating or updating it.
    pub fn check(&mut self, path: &Path) -> FileStatus {
        let (status, record) = self.observe(path);
        if let Some(record) = record {
            self.commit(record);
        }
        status
    }

    /// Compare `path` against its record without changing anything.
    ///
    /// A changed, readable path comes with the record that
    /// [`commit`](Self::commit) should store once the change has been
    /// handled.
    pub fn observe(&self, path: &Path) -> (FileStatus, Option<FileRecord>) {
        let Some((modified, digest)) = read_state(path) else {
            return (FileStatus::Changed(ChangeReason::Missing), None);
        };
        let status = match self.records.get(path) {
            None => FileStatus::Changed(ChangeReason::New),
            Some(record) if record.modified != modified || record.digest != digest => {
                FileStatus::Changed(ChangeReason::Modified)
            }
            Some(_) => return (FileStatus::Unchanged, None),
        };
        let record = FileRecord {
            path: path.to_path_buf(),
            modified,
            digest,
        };
        (status, Some(record))
    }

    /// Store a record produced by [`observe`](Self::observe).
    pub fn commit(&mut self, record: FileRecord) {
        self.records.insert(record.path.clone(), record);
    }

    pub fn record(&self, path: &Path) -> Option<&FileRecord> {
        self.records.get(path)
    }

    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record. The only way records are removed.
    pub fn reset(&mut self) {
        self.records.clear();
    }

    pub fn store_path(&self) -> Option<&Path> {
        self.store.as_deref()
    }

    /// Load/save failures seen so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Overwrite the sidecar with the current records. No-op without a
    /// store path.
    pub fn save(&self) -> Result<(), CacheIoError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let sidecar = Sidecar {
            version: SIDECAR_VERSION,
            files: self.records.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&sidecar).map_err(|source| {
            CacheIoError::Corrupt {
                path: store.clone(),
                source,
            }
        })?;
        if let Some(parent) = store.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CacheIoError::Write {
                path: store.clone(),
                source,
            })?;
        }
        std::fs::write(store, json).map_err(|source| CacheIoError::Write {
            path: store.clone(),
            source,
        })?;
        tracing::debug!(path = %store.display(), count = self.records.len(), "saved file cache");
        Ok(())
    }

    /// [`save`](Self::save), logging instead of returning the error.
    pub fn try_save(&mut self) -> bool {
        match self.save() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("{err}; file cache not persisted");
                self.record_failure(&err);
                false
            }
        }
    }

    fn record_failure(&mut self, err: &CacheIoError) {
        self.diagnostics
            .push(Diagnostic::warning(DiagnosticKind::CacheIo, err.to_string()));
    }
}

fn load_records(store: &Path) -> Result<Vec<FileRecord>, CacheIoError> {
    let text = std::fs::read_to_string(store).map_err(|source| CacheIoError::Read {
        path: store.to_path_buf(),
        source,
    })?;
    let sidecar: Sidecar = serde_json::from_str(&text).map_err(|source| CacheIoError::Corrupt {
        path: store.to_path_buf(),
        source,
    })?;
    if sidecar.version != SIDECAR_VERSION {
        return Err(CacheIoError::Version {
            path: store.to_path_buf(),
            found: sidecar.version,
        });
    }
    Ok(sidecar.files)
}

/// Modification time and content digest, or `None` if unreadable.
fn read_state(path: &Path) -> Option<(u64, String)> {
    let modified = path
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)?;
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::debug!(path = %path.display(), "cannot read tracked file: {err}");
            return None;
        }
    };
    Some((modified, blake3::hash(&content).to_hex().to_string()))
}
