//! In-memory committed store.

use super::CommittedStore;
use crate::error::{IndexError, IndexResult};
use crate::mapping::Mapping;
use crate::types::ResourceId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// A committed store kept entirely in memory.
///
/// Useful for tests and for deployments that rebuild the index from the
/// storage objects on every start.
#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<HashMap<ResourceId, Mapping>>,
    open: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            open: AtomicBool::new(true),
        }
    }
}

impl MemoryStore {
    /// Creates an empty, open store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> IndexResult<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(IndexError::StoreClosed)
        }
    }
}

impl CommittedStore for MemoryStore {
    fn put(&self, resource_id: &ResourceId, mapping: &Mapping) -> IndexResult<()> {
        self.ensure_open()?;
        self.entries
            .write()
            .insert(resource_id.clone(), mapping.clone());
        Ok(())
    }

    fn get(&self, resource_id: &ResourceId) -> IndexResult<Option<Mapping>> {
        self.ensure_open()?;
        Ok(self.entries.read().get(resource_id).cloned())
    }

    fn delete(&self, resource_id: &ResourceId) -> IndexResult<()> {
        self.ensure_open()?;
        self.entries.write().remove(resource_id);
        Ok(())
    }

    fn clear(&self) -> IndexResult<()> {
        self.ensure_open()?;
        self.entries.write().clear();
        Ok(())
    }

    fn len(&self) -> IndexResult<usize> {
        self.ensure_open()?;
        Ok(self.entries.read().len())
    }

    fn close(&self) -> IndexResult<()> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ResourceId {
        ResourceId::new(s)
    }

    #[test]
    fn put_get_delete() {
        let store = MemoryStore::new();
        let mapping = Mapping::new("parent", "ocfl-1");

        assert_eq!(store.get(&id("parent")).unwrap(), None);
        store.put(&id("parent"), &mapping).unwrap();
        assert_eq!(store.get(&id("parent")).unwrap(), Some(mapping));

        store.delete(&id("parent")).unwrap();
        assert_eq!(store.get(&id("parent")).unwrap(), None);
    }

    #[test]
    fn put_replaces() {
        let store = MemoryStore::new();
        store.put(&id("a"), &Mapping::new("a", "obj-1")).unwrap();
        store.put(&id("a"), &Mapping::new("a", "obj-2")).unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(
            store.get(&id("a")).unwrap(),
            Some(Mapping::new("a", "obj-2"))
        );
    }

    #[test]
    fn delete_absent_is_noop() {
        let store = MemoryStore::new();
        store.delete(&id("missing")).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn clear_empties() {
        let store = MemoryStore::new();
        store.put(&id("a"), &Mapping::new("a", "x")).unwrap();
        store.put(&id("b"), &Mapping::new("a", "x")).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn closed_store_rejects_calls() {
        let store = MemoryStore::new();
        store.close().unwrap();
        store.close().unwrap();

        assert!(!store.is_open());
        assert!(matches!(
            store.get(&id("a")),
            Err(IndexError::StoreClosed)
        ));
        assert!(matches!(
            store.put(&id("a"), &Mapping::new("a", "x")),
            Err(IndexError::StoreClosed)
        ));
    }
}
