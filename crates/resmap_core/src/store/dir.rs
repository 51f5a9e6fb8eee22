//! Index directory management.
//!
//! ```text
//! <index_path>/
//! ├─ LOCK            # advisory lock, held while the store is open
//! ├─ index.log       # committed record log
//! └─ index.log.tmp   # compaction output, renamed over index.log
//! ```

use crate::error::{IndexError, IndexResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "index.log";
const COMPACT_TEMP: &str = "index.log.tmp";

/// An index directory with its exclusive lock held.
///
/// The lock is released when this value is dropped.
#[derive(Debug)]
pub(crate) struct IndexDir {
    path: PathBuf,
    lock_file: File,
}

impl IndexDir {
    /// Opens (or creates) the directory and takes the exclusive lock.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if the directory is missing and
    ///   `create_if_missing` is false, or the path is not a directory
    /// - `StoreLocked` if another store holds the lock
    pub(crate) fn open(path: &Path, create_if_missing: bool) -> IndexResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(IndexError::invalid_operation(format!(
                    "index directory does not exist: {}",
                    path.display()
                )));
            }
        }
        if !path.is_dir() {
            return Err(IndexError::invalid_operation(format!(
                "index path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(IndexError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock_file,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    pub(crate) fn compact_temp_path(&self) -> PathBuf {
        self.path.join(COMPACT_TEMP)
    }
}

impl Drop for IndexDir {
    fn drop(&mut self) {
        // Unlock errors on drop are ignored; the OS releases the lock with the handle.
        let _ = FileExt::unlock(&self.lock_file);
    }
}
