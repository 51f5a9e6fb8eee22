//! The mapping value stored per resource.

use crate::types::{ResourceId, RootResourceId, StorageObjectId};

/// Where a resource lives: the root resource it is grouped under and the
/// storage object holding that group.
///
/// Mappings are immutable. Changing where a resource lives means adding a
/// new mapping for it, which replaces the old one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mapping {
    root_resource_id: RootResourceId,
    storage_object_id: StorageObjectId,
}

impl Mapping {
    /// Creates a mapping.
    #[must_use]
    pub fn new(
        root_resource_id: impl Into<RootResourceId>,
        storage_object_id: impl Into<StorageObjectId>,
    ) -> Self {
        Self {
            root_resource_id: root_resource_id.into(),
            storage_object_id: storage_object_id.into(),
        }
    }

    /// Returns the root resource of the group.
    #[must_use]
    pub fn root_resource_id(&self) -> &RootResourceId {
        &self.root_resource_id
    }

    /// Returns the storage object holding the group.
    #[must_use]
    pub fn storage_object_id(&self) -> &StorageObjectId {
        &self.storage_object_id
    }

    /// Returns `true` if `resource_id` is the root of this mapping's group.
    #[must_use]
    pub fn is_root(&self, resource_id: &ResourceId) -> bool {
        &self.root_resource_id == resource_id
    }
}
