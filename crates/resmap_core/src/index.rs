//! The transactional resource index.

use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::mapping::Mapping;
use crate::overlay::{CommitSummary, OverlayLookup, OverlayManager};
use crate::stats::{IndexStats, StatsSnapshot};
use crate::store::{CommittedStore, LogStore, MemoryStore};
use crate::types::{ResourceId, RootResourceId, StorageObjectId, TransactionId};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves resources to the storage objects that hold them.
///
/// `ObjectIndex` composes a shared [`CommittedStore`] with per-transaction
/// overlays. Every operation takes an optional transaction id:
///
/// - `Some(tx)`: adds and removes are staged in the overlay of `tx` and are
///   visible only to reads under `tx` until [`ObjectIndex::commit`];
///   [`ObjectIndex::rollback`] throws them away.
/// - `None`: direct mode. Adds and removes hit the committed store
///   immediately and reads see committed state only.
///
/// Reads under a transaction see its own staged changes first and fall back
/// to the committed store for everything else, including changes other
/// transactions committed after this one started.
///
/// # Commit is not atomic across keys
///
/// A commit writes each staged entry to the store in turn. If the store
/// fails part way, the entries already written stay written and the rest
/// remain staged under the same id.
///
/// # Example
///
/// ```rust
/// use resmap_core::{ObjectIndex, TransactionId};
///
/// let index = ObjectIndex::open_in_memory();
/// let tx = TransactionId::generate();
///
/// index.add_mapping(Some(&tx), "parent/child", "parent", "ocfl-1").unwrap();
/// assert!(index.get_mapping(Some(&tx), "parent/child").is_ok());
/// assert!(index.get_mapping(None, "parent/child").unwrap_err().is_not_found());
///
/// index.commit(&tx).unwrap();
/// let mapping = index.get_mapping(None, "parent/child").unwrap();
/// assert_eq!(mapping.storage_object_id().as_str(), "ocfl-1");
/// ```
pub struct ObjectIndex {
    store: Arc<dyn CommittedStore>,
    overlays: OverlayManager,
    stats: IndexStats,
}

impl ObjectIndex {
    /// Wraps an opened committed store.
    #[must_use]
    pub fn new(store: Arc<dyn CommittedStore>) -> Self {
        Self {
            store,
            overlays: OverlayManager::new(),
            stats: IndexStats::new(),
        }
    }

    /// Opens a durable index in the directory at `path`.
    ///
    /// # Errors
    ///
    /// See [`LogStore::open`].
    pub fn open(path: &Path, config: IndexConfig) -> IndexResult<Self> {
        Ok(Self::new(Arc::new(LogStore::open(path, config)?)))
    }

    /// Creates an index whose committed state lives in memory only.
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Records that `resource_id` lives in `storage_object_id`, grouped
    /// under `root_resource_id`, and returns the new mapping.
    ///
    /// Replaces any earlier mapping for the resource, on commit or at once
    /// in direct mode.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` for an empty resource or transaction id
    /// - a storage error in direct mode if the write fails
    pub fn add_mapping(
        &self,
        tx: Option<&TransactionId>,
        resource_id: impl Into<ResourceId>,
        root_resource_id: impl Into<RootResourceId>,
        storage_object_id: impl Into<StorageObjectId>,
    ) -> IndexResult<Mapping> {
        let resource_id = resource_id.into();
        check_ids(tx, &resource_id)?;
        let mapping = Mapping::new(root_resource_id, storage_object_id);

        match tx {
            Some(tx) => {
                self.overlays.stage_upsert(tx, resource_id, mapping.clone());
                self.stats.record_staged_upsert();
            }
            None => {
                self.track(self.store.put(&resource_id, &mapping))?;
                self.stats.record_direct_write();
            }
        }
        Ok(mapping)
    }

    /// Resolves `resource_id` to its mapping as seen by `tx`.
    ///
    /// With a transaction, its own staged mapping or removal decides;
    /// otherwise the committed store does.
    ///
    /// # Errors
    ///
    /// - `MappingNotFound` if the resource is removed in `tx` or has no
    ///   committed mapping
    /// - `InvalidOperation` for an empty resource or transaction id
    /// - a storage error if the committed store cannot be read
    pub fn get_mapping(
        &self,
        tx: Option<&TransactionId>,
        resource_id: impl Into<ResourceId>,
    ) -> IndexResult<Mapping> {
        let resource_id = resource_id.into();
        check_ids(tx, &resource_id)?;
        self.stats.record_lookup();

        if let Some(tx) = tx {
            match self.overlays.lookup(tx, &resource_id) {
                OverlayLookup::Overlaid(mapping) => {
                    self.stats.record_overlay_hit();
                    return Ok(mapping);
                }
                OverlayLookup::Tombstoned => {
                    self.stats.record_overlay_hit();
                    self.stats.record_not_found();
                    return Err(IndexError::mapping_not_found(resource_id));
                }
                OverlayLookup::NotStaged => {}
            }
        }

        match self.track(self.store.get(&resource_id))? {
            Some(mapping) => Ok(mapping),
            None => {
                self.stats.record_not_found();
                Err(IndexError::mapping_not_found(resource_id))
            }
        }
    }

    /// Removes the mapping of `resource_id`, on commit of `tx` or at once in
    /// direct mode. Removing an unmapped resource is not an error.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` for an empty resource or transaction id
    /// - a storage error in direct mode if the delete fails
    pub fn remove_mapping(
        &self,
        tx: Option<&TransactionId>,
        resource_id: impl Into<ResourceId>,
    ) -> IndexResult<()> {
        let resource_id = resource_id.into();
        check_ids(tx, &resource_id)?;

        match tx {
            Some(tx) => {
                self.overlays.stage_tombstone(tx, resource_id);
                self.stats.record_staged_tombstone();
            }
            None => {
                self.track(self.store.delete(&resource_id))?;
                self.stats.record_direct_delete();
            }
        }
        Ok(())
    }

    /// Publishes everything staged under `tx` to the committed store.
    ///
    /// Committing an id that staged nothing, or was already committed or
    /// rolled back, succeeds and does nothing.
    ///
    /// # Errors
    ///
    /// Returns the first storage error; see the type-level docs for what is
    /// left applied and what stays staged.
    pub fn commit(&self, tx: &TransactionId) -> IndexResult<CommitSummary> {
        let summary = self.track(self.overlays.commit(tx, self.store.as_ref()))?;
        self.stats.record_commit();
        Ok(summary)
    }

    /// Discards everything staged under `tx`. Committed state is untouched.
    ///
    /// Safe to call at any time, including for ids that never staged
    /// anything.
    pub fn rollback(&self, tx: &TransactionId) {
        self.overlays.rollback(tx);
        self.stats.record_rollback();
    }

    /// Discards every overlay and removes every committed mapping.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the committed store cannot be cleared.
    pub fn reset(&self) -> IndexResult<()> {
        let discarded = self.overlays.clear();
        self.track(self.store.clear())?;
        info!(discarded_transactions = discarded, "reset index");
        Ok(())
    }

    /// Returns `true` if `tx` has staged changes.
    #[must_use]
    pub fn has_pending(&self, tx: &TransactionId) -> bool {
        self.overlays.is_active(tx)
    }

    /// Number of changes staged under `tx`.
    #[must_use]
    pub fn pending_count(&self, tx: &TransactionId) -> usize {
        self.overlays.staged_count(tx)
    }

    /// Number of transactions with staged changes.
    #[must_use]
    pub fn active_transactions(&self) -> usize {
        self.overlays.active_count()
    }

    /// Returns a snapshot of the operation counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the committed store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CommittedStore> {
        &self.store
    }

    /// Closes the committed store. Staged changes of open transactions are
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the final flush fails.
    pub fn close(&self) -> IndexResult<()> {
        let discarded = self.overlays.clear();
        if discarded > 0 {
            warn!(discarded, "closing index with uncommitted transactions");
        }
        self.track(self.store.close())?;
        debug!("closed index");
        Ok(())
    }

    fn track<T>(&self, result: IndexResult<T>) -> IndexResult<T> {
        if result.is_err() {
            self.stats.record_error();
        }
        result
    }
}

fn check_ids(tx: Option<&TransactionId>, resource_id: &ResourceId) -> IndexResult<()> {
    if resource_id.is_empty() {
        return Err(IndexError::invalid_operation("resource id must not be empty"));
    }
    if tx.is_some_and(TransactionId::is_empty) {
        return Err(IndexError::invalid_operation(
            "transaction id must not be empty",
        ));
    }
    Ok(())
}

impl std::fmt::Debug for ObjectIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectIndex")
            .field("active_transactions", &self.active_transactions())
            .field("store_open", &self.store.is_open())
            .finish_non_exhaustive()
    }
}
