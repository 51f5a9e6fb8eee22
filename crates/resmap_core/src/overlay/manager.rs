//! Overlay manager.

use crate::error::IndexResult;
use crate::mapping::Mapping;
use crate::overlay::state::{Overlay, OverlayLookup};
use crate::store::CommittedStore;
use crate::types::{ResourceId, TransactionId};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, warn};

/// What a commit applied to the committed store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Mappings written.
    pub upserts: usize,
    /// Mappings deleted.
    pub tombstones: usize,
}

impl CommitSummary {
    /// Returns `true` if the commit applied nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts == 0 && self.tombstones == 0
    }
}

/// Tracks the overlays of all in-flight transactions.
///
/// Overlays are created lazily by the first staged change and destroyed by
/// commit or rollback, so an id that never staged anything, or was already
/// committed, has no overlay and both operations are no-ops for it.
///
/// ## Commit
///
/// Commit applies a copy of the overlay without holding the manager lock:
/// all upserts, then all tombstones, each in resource id order. The overlay
/// itself stays attached, so the transaction keeps reading its own writes
/// while the commit runs. Each entry is dropped from it only after its store
/// write succeeds, and only if it was not restaged in the meantime.
///
/// Application is per key; there is no cross-key atomicity. If the store
/// fails part way, the entries not yet applied are still staged, so the
/// caller can retry the commit or roll back.
#[derive(Default)]
pub struct OverlayManager {
    overlays: RwLock<HashMap<TransactionId, Overlay>>,
}

impl OverlayManager {
    /// Creates a manager with no active transactions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages `mapping` for `resource_id` under `tx`.
    pub fn stage_upsert(&self, tx: &TransactionId, resource_id: ResourceId, mapping: Mapping) {
        self.overlays
            .write()
            .entry(tx.clone())
            .or_default()
            .stage_upsert(resource_id, mapping);
    }

    /// Stages the removal of `resource_id` under `tx`.
    pub fn stage_tombstone(&self, tx: &TransactionId, resource_id: ResourceId) {
        self.overlays
            .write()
            .entry(tx.clone())
            .or_default()
            .stage_tombstone(resource_id);
    }

    /// Looks up what `tx` has staged for `resource_id`.
    #[must_use]
    pub fn lookup(&self, tx: &TransactionId, resource_id: &ResourceId) -> OverlayLookup {
        self.overlays
            .read()
            .get(tx)
            .map_or(OverlayLookup::NotStaged, |overlay| overlay.lookup(resource_id))
    }

    /// Applies the overlay of `tx` to `store` and discards it.
    ///
    /// Committing an id with no overlay succeeds and applies nothing.
    /// Entries staged under `tx` while the commit runs stay staged.
    ///
    /// # Errors
    ///
    /// Returns the first store error. Entries applied before it stay applied;
    /// the rest stay staged under `tx`.
    pub fn commit(
        &self,
        tx: &TransactionId,
        store: &dyn CommittedStore,
    ) -> IndexResult<CommitSummary> {
        let Some(pending) = self.snapshot(tx) else {
            debug!(%tx, "commit of transaction with nothing staged");
            return Ok(CommitSummary::default());
        };

        let mut summary = CommitSummary::default();

        for (resource_id, mapping) in pending.upserts() {
            if let Err(e) = store.put(resource_id, mapping) {
                self.warn_partial(tx, &summary, pending.len());
                return Err(e);
            }
            if !self.settle(tx, |overlay| overlay.settle_upsert(resource_id, mapping)) {
                debug!(%tx, resource = %resource_id, "entry changed during commit; left staged");
            }
            summary.upserts += 1;
        }

        for resource_id in pending.tombstones() {
            if let Err(e) = store.delete(resource_id) {
                self.warn_partial(tx, &summary, pending.len());
                return Err(e);
            }
            if !self.settle(tx, |overlay| overlay.settle_tombstone(resource_id)) {
                debug!(%tx, resource = %resource_id, "entry changed during commit; left staged");
            }
            summary.tombstones += 1;
        }

        store.flush()?;
        debug!(
            %tx,
            upserts = summary.upserts,
            tombstones = summary.tombstones,
            "committed transaction overlay"
        );
        Ok(summary)
    }

    /// Runs `f` on the overlay of `tx`, dropping the overlay once it is empty.
    fn settle(&self, tx: &TransactionId, f: impl FnOnce(&mut Overlay) -> bool) -> bool {
        let mut overlays = self.overlays.write();
        let Some(overlay) = overlays.get_mut(tx) else {
            return false;
        };
        let settled = f(overlay);
        if overlay.is_empty() {
            overlays.remove(tx);
        }
        settled
    }

    fn warn_partial(&self, tx: &TransactionId, applied: &CommitSummary, pending: usize) {
        warn!(
            %tx,
            applied_upserts = applied.upserts,
            applied_tombstones = applied.tombstones,
            remaining = pending - applied.upserts - applied.tombstones,
            "commit failed part way; unapplied entries kept staged"
        );
    }

    /// Discards the overlay of `tx` and returns it, if there was one.
    pub fn rollback(&self, tx: &TransactionId) -> Option<Overlay> {
        let discarded = self.overlays.write().remove(tx);
        if let Some(overlay) = &discarded {
            debug!(%tx, discarded = overlay.len(), "rolled back transaction overlay");
        }
        discarded
    }

    /// Returns `true` if `tx` has a staged overlay.
    #[must_use]
    pub fn is_active(&self, tx: &TransactionId) -> bool {
        self.overlays.read().contains_key(tx)
    }

    /// Number of entries staged under `tx`.
    #[must_use]
    pub fn staged_count(&self, tx: &TransactionId) -> usize {
        self.overlays.read().get(tx).map_or(0, Overlay::len)
    }

    /// Number of transactions with a staged overlay.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.overlays.read().len()
    }

    /// Returns a copy of the overlay of `tx`.
    #[must_use]
    pub fn snapshot(&self, tx: &TransactionId) -> Option<Overlay> {
        self.overlays.read().get(tx).cloned()
    }

    /// Discards every overlay, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut overlays = self.overlays.write();
        let count = overlays.len();
        overlays.clear();
        count
    }
}

impl std::fmt::Debug for OverlayManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayManager")
            .field("active_count", &self.active_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use crate::store::MemoryStore;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    fn id(s: &str) -> ResourceId {
        ResourceId::new(s)
    }

    /// Fails every write once `budget` writes have succeeded.
    struct FlakyStore {
        inner: MemoryStore,
        budget: AtomicUsize,
    }

    impl FlakyStore {
        fn new(budget: usize) -> Self {
            Self {
                inner: MemoryStore::new(),
                budget: AtomicUsize::new(budget),
            }
        }

        fn spend(&self) -> IndexResult<()> {
            self.budget
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| b.checked_sub(1))
                .map(|_| ())
                .map_err(|_| resmap_storage::StorageError::Closed.into())
        }

        fn refill(&self, budget: usize) {
            self.budget.store(budget, Ordering::SeqCst);
        }
    }

    impl CommittedStore for FlakyStore {
        fn put(&self, resource_id: &ResourceId, mapping: &Mapping) -> IndexResult<()> {
            self.spend()?;
            self.inner.put(resource_id, mapping)
        }

        fn get(&self, resource_id: &ResourceId) -> IndexResult<Option<Mapping>> {
            self.inner.get(resource_id)
        }

        fn delete(&self, resource_id: &ResourceId) -> IndexResult<()> {
            self.spend()?;
            self.inner.delete(resource_id)
        }

        fn clear(&self) -> IndexResult<()> {
            self.inner.clear()
        }

        fn len(&self) -> IndexResult<usize> {
            self.inner.len()
        }

        fn close(&self) -> IndexResult<()> {
            self.inner.close()
        }

        fn is_open(&self) -> bool {
            self.inner.is_open()
        }
    }

    /// Holds the first `put` of one key until the test releases it.
    struct GatedStore {
        inner: MemoryStore,
        gate: Mutex<Option<ResourceId>>,
        entered: Barrier,
        release: Barrier,
    }

    impl GatedStore {
        fn new(gate: &str) -> Self {
            Self {
                inner: MemoryStore::new(),
                gate: Mutex::new(Some(id(gate))),
                entered: Barrier::new(2),
                release: Barrier::new(2),
            }
        }
    }

    impl CommittedStore for GatedStore {
        fn put(&self, resource_id: &ResourceId, mapping: &Mapping) -> IndexResult<()> {
            let gated = {
                let mut gate = self.gate.lock();
                let hit = gate.as_ref() == Some(resource_id);
                if hit {
                    *gate = None;
                }
                hit
            };
            if gated {
                self.entered.wait();
                self.release.wait();
            }
            self.inner.put(resource_id, mapping)
        }

        fn get(&self, resource_id: &ResourceId) -> IndexResult<Option<Mapping>> {
            self.inner.get(resource_id)
        }

        fn delete(&self, resource_id: &ResourceId) -> IndexResult<()> {
            self.inner.delete(resource_id)
        }

        fn clear(&self) -> IndexResult<()> {
            self.inner.clear()
        }

        fn len(&self) -> IndexResult<usize> {
            self.inner.len()
        }

        fn close(&self) -> IndexResult<()> {
            self.inner.close()
        }

        fn is_open(&self) -> bool {
            self.inner.is_open()
        }
    }

    #[test]
    fn transactions_are_independent() {
        let manager = OverlayManager::new();
        let a = TransactionId::new("a");
        let b = TransactionId::new("b");

        manager.stage_upsert(&a, id("r"), Mapping::new("r", "x"));
        manager.stage_tombstone(&b, id("r"));

        assert_eq!(
            manager.lookup(&a, &id("r")),
            OverlayLookup::Overlaid(Mapping::new("r", "x"))
        );
        assert_eq!(manager.lookup(&b, &id("r")), OverlayLookup::Tombstoned);
        assert_eq!(
            manager.lookup(&TransactionId::new("c"), &id("r")),
            OverlayLookup::NotStaged
        );
        assert_eq!(manager.active_count(), 2);
    }

    #[test]
    fn commit_applies_and_discards() {
        let manager = OverlayManager::new();
        let store = MemoryStore::new();
        store.put(&id("old"), &Mapping::new("old", "x")).unwrap();

        let tx = TransactionId::new("tx");
        manager.stage_upsert(&tx, id("new"), Mapping::new("new", "y"));
        manager.stage_tombstone(&tx, id("old"));

        let summary = manager.commit(&tx, &store).unwrap();
        assert_eq!(
            summary,
            CommitSummary {
                upserts: 1,
                tombstones: 1
            }
        );
        assert!(!manager.is_active(&tx));
        assert_eq!(store.get(&id("new")).unwrap(), Some(Mapping::new("new", "y")));
        assert_eq!(store.get(&id("old")).unwrap(), None);
    }

    #[test]
    fn commit_of_unknown_transaction_is_noop() {
        let manager = OverlayManager::new();
        let store = MemoryStore::new();
        let tx = TransactionId::new("never-used");

        assert!(manager.commit(&tx, &store).unwrap().is_empty());
        assert!(manager.commit(&tx, &store).unwrap().is_empty());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn rollback_discards_without_touching_store() {
        let manager = OverlayManager::new();
        let store = MemoryStore::new();
        let tx = TransactionId::new("tx");

        manager.stage_upsert(&tx, id("a"), Mapping::new("a", "x"));
        let discarded = manager.rollback(&tx).unwrap();
        assert_eq!(discarded.len(), 1);

        assert!(manager.rollback(&tx).is_none());
        assert!(manager.commit(&tx, &store).unwrap().is_empty());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn failed_commit_keeps_unapplied_entries() {
        let manager = OverlayManager::new();
        let store = FlakyStore::new(1);
        let tx = TransactionId::new("tx");

        manager.stage_upsert(&tx, id("a"), Mapping::new("a", "x"));
        manager.stage_upsert(&tx, id("b"), Mapping::new("b", "x"));
        manager.stage_tombstone(&tx, id("c"));

        let err = manager.commit(&tx, &store).unwrap_err();
        assert!(matches!(err, IndexError::Storage(_)));

        // "a" made it; "b" and the tombstone for "c" are still staged.
        assert_eq!(store.get(&id("a")).unwrap(), Some(Mapping::new("a", "x")));
        assert_eq!(store.get(&id("b")).unwrap(), None);
        assert_eq!(manager.staged_count(&tx), 2);
        assert_eq!(manager.lookup(&tx, &id("a")), OverlayLookup::NotStaged);
        assert_eq!(manager.lookup(&tx, &id("c")), OverlayLookup::Tombstoned);

        store.refill(10);
        let summary = manager.commit(&tx, &store).unwrap();
        assert_eq!(summary.upserts, 1);
        assert_eq!(summary.tombstones, 1);
        assert_eq!(store.get(&id("b")).unwrap(), Some(Mapping::new("b", "x")));
    }

    #[test]
    fn clear_discards_everything() {
        let manager = OverlayManager::new();
        manager.stage_upsert(&TransactionId::new("a"), id("r"), Mapping::new("r", "x"));
        manager.stage_tombstone(&TransactionId::new("b"), id("r"));

        assert_eq!(manager.clear(), 2);
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn snapshot_copies_overlay() {
        let manager = OverlayManager::new();
        let tx = TransactionId::new("tx");
        manager.stage_upsert(&tx, id("r"), Mapping::new("r", "x"));

        let snapshot = manager.snapshot(&tx).unwrap();
        manager.stage_tombstone(&tx, id("r"));
        assert_eq!(
            snapshot.lookup(&id("r")),
            OverlayLookup::Overlaid(Mapping::new("r", "x"))
        );
    }

    #[test]
    fn overlay_stays_visible_while_commit_runs() {
        let manager = OverlayManager::new();
        let store = GatedStore::new("b");
        store.inner.put(&id("z"), &Mapping::new("z", "x")).unwrap();

        let tx = TransactionId::new("tx");
        manager.stage_upsert(&tx, id("a"), Mapping::new("a", "x"));
        manager.stage_upsert(&tx, id("b"), Mapping::new("b", "x"));
        manager.stage_tombstone(&tx, id("z"));

        thread::scope(|scope| {
            let commit = scope.spawn(|| manager.commit(&tx, &store));
            store.entered.wait();

            // "a" is applied, "b" is being written, "z" is not deleted yet.
            assert_eq!(manager.lookup(&tx, &id("a")), OverlayLookup::NotStaged);
            assert_eq!(store.get(&id("a")).unwrap(), Some(Mapping::new("a", "x")));
            assert_eq!(
                manager.lookup(&tx, &id("b")),
                OverlayLookup::Overlaid(Mapping::new("b", "x"))
            );
            assert_eq!(manager.lookup(&tx, &id("z")), OverlayLookup::Tombstoned);
            assert_eq!(store.get(&id("z")).unwrap(), Some(Mapping::new("z", "x")));
            assert_eq!(manager.staged_count(&tx), 2);

            store.release.wait();
            let summary = commit.join().unwrap().unwrap();
            assert_eq!(
                summary,
                CommitSummary {
                    upserts: 2,
                    tombstones: 1
                }
            );
        });

        assert!(!manager.is_active(&tx));
        assert_eq!(store.get(&id("b")).unwrap(), Some(Mapping::new("b", "x")));
        assert_eq!(store.get(&id("z")).unwrap(), None);
    }

    #[test]
    fn restaging_during_commit_is_kept() {
        let manager = OverlayManager::new();
        let store = GatedStore::new("a");
        let tx = TransactionId::new("tx");
        manager.stage_upsert(&tx, id("a"), Mapping::new("a", "old"));
        manager.stage_tombstone(&tx, id("z"));

        thread::scope(|scope| {
            let commit = scope.spawn(|| manager.commit(&tx, &store));
            store.entered.wait();
            manager.stage_upsert(&tx, id("a"), Mapping::new("a", "new"));
            manager.stage_upsert(&tx, id("z"), Mapping::new("z", "new"));
            store.release.wait();
            commit.join().unwrap().unwrap();
        });

        // The commit wrote what it started with; the newer entries wait.
        assert_eq!(store.get(&id("a")).unwrap(), Some(Mapping::new("a", "old")));
        assert_eq!(store.get(&id("z")).unwrap(), None);
        assert_eq!(manager.staged_count(&tx), 2);
        assert_eq!(
            manager.lookup(&tx, &id("a")),
            OverlayLookup::Overlaid(Mapping::new("a", "new"))
        );

        manager.commit(&tx, &store).unwrap();
        assert!(!manager.is_active(&tx));
        assert_eq!(store.get(&id("a")).unwrap(), Some(Mapping::new("a", "new")));
        assert_eq!(store.get(&id("z")).unwrap(), Some(Mapping::new("z", "new")));
    }
}
