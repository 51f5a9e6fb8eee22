//! Per-transaction overlay state.

use crate::mapping::Mapping;
use crate::types::ResourceId;
use std::collections::{BTreeMap, BTreeSet};

/// What a transaction's overlay says about one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayLookup {
    /// The transaction staged this mapping.
    Overlaid(Mapping),
    /// The transaction staged a removal.
    Tombstoned,
    /// The transaction has not touched the resource; read committed state.
    NotStaged,
}

/// Staged, uncommitted changes of one transaction.
///
/// A resource is in at most one of the two collections; the later call
/// wins. Both are ordered so commits apply keys in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlay {
    upserts: BTreeMap<ResourceId, Mapping>,
    tombstones: BTreeSet<ResourceId>,
}

impl Overlay {
    /// Creates an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages `mapping` for `resource_id`, superseding a staged removal.
    pub fn stage_upsert(&mut self, resource_id: ResourceId, mapping: Mapping) {
        self.tombstones.remove(&resource_id);
        self.upserts.insert(resource_id, mapping);
    }

    /// Stages the removal of `resource_id`, superseding a staged mapping.
    pub fn stage_tombstone(&mut self, resource_id: ResourceId) {
        self.upserts.remove(&resource_id);
        self.tombstones.insert(resource_id);
    }

    /// Looks up what this overlay says about `resource_id`.
    #[must_use]
    pub fn lookup(&self, resource_id: &ResourceId) -> OverlayLookup {
        if let Some(mapping) = self.upserts.get(resource_id) {
            OverlayLookup::Overlaid(mapping.clone())
        } else if self.tombstones.contains(resource_id) {
            OverlayLookup::Tombstoned
        } else {
            OverlayLookup::NotStaged
        }
    }

    /// Staged mappings, in resource id order.
    pub fn upserts(&self) -> impl Iterator<Item = (&ResourceId, &Mapping)> {
        self.upserts.iter()
    }

    /// Staged removals, in resource id order.
    pub fn tombstones(&self) -> impl Iterator<Item = &ResourceId> {
        self.tombstones.iter()
    }

    /// Number of staged entries of either kind.
    #[must_use]
    pub fn len(&self) -> usize {
        self.upserts.len() + self.tombstones.len()
    }

    /// Returns `true` if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.tombstones.is_empty()
    }

    /// Drops the staged mapping for `resource_id` if it is still `applied`.
    ///
    /// Returns `false` when the entry was restaged since, leaving it in place.
    pub(crate) fn settle_upsert(&mut self, resource_id: &ResourceId, applied: &Mapping) -> bool {
        if self.upserts.get(resource_id) == Some(applied) {
            self.upserts.remove(resource_id);
            true
        } else {
            false
        }
    }

    /// Drops the staged removal of `resource_id`, if it is still staged.
    pub(crate) fn settle_tombstone(&mut self, resource_id: &ResourceId) -> bool {
        self.tombstones.remove(resource_id)
    }
}
