//! Index statistics.
//!
//! Counters are atomic and can be read while operations are in flight.
//!
//! ```rust,ignore
//! let index = ObjectIndex::open_in_memory();
//! index.add_mapping(None, "a", "a", "obj")?;
//! assert_eq!(index.stats().direct_writes, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters for an [`ObjectIndex`](crate::ObjectIndex).
#[derive(Debug, Default)]
pub struct IndexStats {
    lookups: AtomicU64,
    lookups_not_found: AtomicU64,
    overlay_hits: AtomicU64,
    staged_upserts: AtomicU64,
    staged_tombstones: AtomicU64,
    direct_writes: AtomicU64,
    direct_deletes: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    errors: AtomicU64,
}

impl IndexStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_not_found(&self) {
        self.lookups_not_found.fetch_add(1, Ordering::Relaxed);
    }

    /// A lookup answered by a transaction overlay (mapping or tombstone).
    pub(crate) fn record_overlay_hit(&self) {
        self.overlay_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_staged_upsert(&self) {
        self.staged_upserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_staged_tombstone(&self) {
        self.staged_tombstones.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_direct_write(&self) {
        self.direct_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_direct_delete(&self) {
        self.direct_deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lookups: self.lookups.load(Ordering::Relaxed),
            lookups_not_found: self.lookups_not_found.load(Ordering::Relaxed),
            overlay_hits: self.overlay_hits.load(Ordering::Relaxed),
            staged_upserts: self.staged_upserts.load(Ordering::Relaxed),
            staged_tombstones: self.staged_tombstones.load(Ordering::Relaxed),
            direct_writes: self.direct_writes.load(Ordering::Relaxed),
            direct_deletes: self.direct_deletes.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// A plain copy of [`IndexStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// `get_mapping` calls.
    pub lookups: u64,
    /// `get_mapping` calls that ended in `MappingNotFound`.
    pub lookups_not_found: u64,
    /// Lookups answered by a transaction overlay.
    pub overlay_hits: u64,
    /// Mappings staged under a transaction.
    pub staged_upserts: u64,
    /// Removals staged under a transaction.
    pub staged_tombstones: u64,
    /// Mappings written straight to the committed store.
    pub direct_writes: u64,
    /// Removals applied straight to the committed store.
    pub direct_deletes: u64,
    /// Commits, including no-op commits.
    pub commits: u64,
    /// Rollbacks, including no-op rollbacks.
    pub rollbacks: u64,
    /// Storage errors returned to callers.
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        assert_eq!(IndexStats::new().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn snapshot_reflects_records() {
        let stats = IndexStats::new();
        stats.record_lookup();
        stats.record_lookup();
        stats.record_not_found();
        stats.record_staged_upsert();
        stats.record_commit();

        let snap = stats.snapshot();
        assert_eq!(snap.lookups, 2);
        assert_eq!(snap.lookups_not_found, 1);
        assert_eq!(snap.staged_upserts, 1);
        assert_eq!(snap.commits, 1);
        assert_eq!(snap.rollbacks, 0);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(IndexStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.record_lookup();
                        s.record_overlay_hit();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = stats.snapshot();
        assert_eq!(snap.lookups, 800);
        assert_eq!(snap.overlay_hits, 800);
    }
}
