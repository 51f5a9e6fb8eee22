//! Durable log-structured committed store.

use super::dir::IndexDir;
use super::record::{replay, LogRecord};
use super::CommittedStore;
use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::mapping::Mapping;
use crate::types::ResourceId;
use parking_lot::{Mutex, RwLock};
use resmap_storage::{FileBackend, StorageBackend};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Outcome of a log compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionResult {
    /// Records in the log before compaction.
    pub records_before: u64,
    /// Records after compaction (one per live mapping).
    pub records_after: u64,
    /// Log size in bytes before compaction.
    pub bytes_before: u64,
    /// Log size in bytes after compaction.
    pub bytes_after: u64,
}

/// A committed store persisted as an append-only log of put/delete records.
///
/// Every write appends one record; the live mappings are kept in a map that
/// is rebuilt by replaying the log on open. A crash in the middle of an
/// append leaves a torn tail, which recovery cuts off. Overwritten and
/// deleted records accumulate until compaction rewrites the log with one
/// record per live mapping.
///
/// All writers go through one lock, so the log order always matches the
/// order in which the in-memory map was updated.
///
/// # Example
///
/// ```rust,ignore
/// use resmap_core::{CommittedStore, IndexConfig, LogStore, Mapping, ResourceId};
/// use std::path::Path;
///
/// let store = LogStore::open(Path::new("index"), IndexConfig::default())?;
/// store.put(&ResourceId::new("parent"), &Mapping::new("parent", "ocfl-1"))?;
/// store.close()?;
/// ```
pub struct LogStore {
    config: IndexConfig,
    /// Directory lock; `None` for backend-only stores and after close.
    dir: Mutex<Option<IndexDir>>,
    /// Log and compaction paths for directory-backed stores.
    paths: Option<(PathBuf, PathBuf)>,
    state: RwLock<LogState>,
    open: AtomicBool,
}

struct LogState {
    backend: Box<dyn StorageBackend>,
    entries: HashMap<ResourceId, Mapping>,
    records: u64,
}

impl LogStore {
    /// Opens the index directory at `path`, replaying its log.
    ///
    /// # Errors
    ///
    /// - `StoreLocked` if another open store holds the directory
    /// - `InvalidOperation` if the directory is missing and
    ///   `create_if_missing` is off
    /// - `Corruption` if an intact record cannot be decoded
    pub fn open(path: &Path, config: IndexConfig) -> IndexResult<Self> {
        let dir = IndexDir::open(path, config.create_if_missing)?;
        let log_path = dir.log_path();
        let temp_path = dir.compact_temp_path();
        if temp_path.exists() {
            warn!(path = %temp_path.display(), "removing leftover compaction output");
            std::fs::remove_file(&temp_path)?;
        }

        let backend = FileBackend::open(&log_path)?;
        let store = Self::recover(Box::new(backend), config, Some(dir), Some((log_path, temp_path)))?;
        info!(path = %path.display(), entries = store.state.read().entries.len(), "opened index log");
        Ok(store)
    }

    /// Builds a store over an arbitrary backend, replaying whatever it holds.
    ///
    /// No directory lock is taken; the caller owns exclusivity. Such a store
    /// is never compacted, since compaction writes a second log beside the
    /// first.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if an intact record cannot be decoded, or a
    /// storage error if the backend cannot be read or truncated.
    pub fn with_backend(backend: Box<dyn StorageBackend>, config: IndexConfig) -> IndexResult<Self> {
        Self::recover(backend, config, None, None)
    }

    fn recover(
        mut backend: Box<dyn StorageBackend>,
        config: IndexConfig,
        dir: Option<IndexDir>,
        paths: Option<(PathBuf, PathBuf)>,
    ) -> IndexResult<Self> {
        let data = backend.read_all()?;
        let replayed = replay(&data)?;

        let size = data.len() as u64;
        if replayed.valid_len < size {
            warn!(
                valid_len = replayed.valid_len,
                torn_bytes = size - replayed.valid_len,
                "truncating torn tail of index log"
            );
            backend.truncate(replayed.valid_len)?;
        }
        debug!(
            records = replayed.records,
            entries = replayed.entries.len(),
            "replayed index log"
        );

        Ok(Self {
            config,
            dir: Mutex::new(dir),
            paths,
            state: RwLock::new(LogState {
                backend,
                entries: replayed.entries,
                records: replayed.records,
            }),
            open: AtomicBool::new(true),
        })
    }

    /// Returns the index directory, if this store is directory-backed and open.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.dir.lock().as_ref().map(|dir| dir.path().to_path_buf())
    }

    /// Returns the number of records in the log, live or dead.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.state.read().records
    }

    /// Returns the size of the log in bytes.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the size cannot be read.
    pub fn log_size(&self) -> IndexResult<u64> {
        Ok(self.state.read().backend.size()?)
    }

    /// Rewrites the log so it holds one put record per live mapping.
    ///
    /// The new log is written and synced beside the old one and then renamed
    /// over it, so the old log stays whole until the new one is complete.
    ///
    /// # Errors
    ///
    /// - `StoreClosed` after close
    /// - `InvalidOperation` for backend-only stores, which have nowhere to
    ///   write a second log
    /// - a storage/I/O error if the new log cannot be written, in which case
    ///   the old log is left intact
    pub fn compact(&self) -> IndexResult<CompactionResult> {
        self.ensure_open()?;
        let Some((log_path, temp_path)) = &self.paths else {
            return Err(IndexError::invalid_operation(
                "compaction needs a directory-backed log",
            ));
        };
        let mut state = self.state.write();
        Self::compact_locked(&mut state, log_path, temp_path)
    }

    fn compact_locked(
        state: &mut LogState,
        log_path: &Path,
        temp_path: &Path,
    ) -> IndexResult<CompactionResult> {
        let records_before = state.records;
        let bytes_before = state.backend.size()?;

        let mut keys: Vec<&ResourceId> = state.entries.keys().collect();
        keys.sort();
        let mut image = Vec::new();
        for key in keys {
            image.extend_from_slice(&LogRecord::put(key, &state.entries[key]).encode());
        }

        let mut temp = FileBackend::open(temp_path)?;
        temp.truncate(0)?;
        temp.append(&image)?;
        temp.sync()?;
        temp.rename_to(log_path)?;
        state.backend = Box::new(temp);

        state.records = state.entries.len() as u64;
        let result = CompactionResult {
            records_before,
            records_after: state.records,
            bytes_before,
            bytes_after: image.len() as u64,
        };
        info!(
            records_before = result.records_before,
            records_after = result.records_after,
            bytes_before = result.bytes_before,
            bytes_after = result.bytes_after,
            "compacted index log"
        );
        Ok(result)
    }

    fn append(&self, state: &mut LogState, record: &LogRecord) -> IndexResult<()> {
        state.backend.append(&record.encode())?;
        state.backend.flush()?;
        if self.config.sync_on_write {
            state.backend.sync()?;
        }
        state.records += 1;
        Ok(())
    }

    /// Compacts once the log holds enough garbage.
    ///
    /// Runs after a write has already reached the log, so a failure here is
    /// logged and the write still succeeds.
    fn maybe_compact(&self, state: &mut LogState) {
        let Some((log_path, temp_path)) = &self.paths else {
            return;
        };
        if !self
            .config
            .should_compact(state.records, state.entries.len() as u64)
        {
            return;
        }
        if let Err(e) = Self::compact_locked(state, log_path, temp_path) {
            warn!(error = %e, records = state.records, "automatic compaction failed");
        }
    }

    fn ensure_open(&self) -> IndexResult<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(IndexError::StoreClosed)
        }
    }
}

impl CommittedStore for LogStore {
    fn put(&self, resource_id: &ResourceId, mapping: &Mapping) -> IndexResult<()> {
        self.ensure_open()?;
        let mut state = self.state.write();
        self.append(&mut state, &LogRecord::put(resource_id, mapping))?;
        state.entries.insert(resource_id.clone(), mapping.clone());
        self.maybe_compact(&mut state);
        Ok(())
    }

    fn get(&self, resource_id: &ResourceId) -> IndexResult<Option<Mapping>> {
        self.ensure_open()?;
        Ok(self.state.read().entries.get(resource_id).cloned())
    }

    fn delete(&self, resource_id: &ResourceId) -> IndexResult<()> {
        self.ensure_open()?;
        let mut state = self.state.write();
        if !state.entries.contains_key(resource_id) {
            return Ok(());
        }
        self.append(&mut state, &LogRecord::delete(resource_id))?;
        state.entries.remove(resource_id);
        self.maybe_compact(&mut state);
        Ok(())
    }

    fn clear(&self) -> IndexResult<()> {
        self.ensure_open()?;
        let mut state = self.state.write();
        state.backend.truncate(0)?;
        state.backend.sync()?;
        state.entries.clear();
        state.records = 0;
        info!("cleared index log");
        Ok(())
    }

    fn len(&self) -> IndexResult<usize> {
        self.ensure_open()?;
        Ok(self.state.read().entries.len())
    }

    fn flush(&self) -> IndexResult<()> {
        self.ensure_open()?;
        let mut state = self.state.write();
        state.backend.flush()?;
        state.backend.sync()?;
        Ok(())
    }

    fn close(&self) -> IndexResult<()> {
        if !self.open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        {
            let mut state = self.state.write();
            state.backend.flush()?;
            state.backend.sync()?;
        }
        self.dir.lock().take();
        info!("closed index log");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("path", &self.path())
            .field("records", &self.record_count())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
