//! Test fixtures and index helpers.
//!
//! Provides convenience functions for setting up test indexes
//! and common test scenarios.

use resmap_core::{IndexConfig, ObjectIndex};
use std::path::Path;
use tempfile::TempDir;

/// A test index with automatic cleanup.
pub struct TestIndex {
    /// The index instance.
    pub index: ObjectIndex,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestIndex {
    /// Creates a new in-memory test index.
    pub fn memory() -> Self {
        Self {
            index: ObjectIndex::open_in_memory(),
            temp_dir: None,
        }
    }

    /// Creates a new log-backed test index in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let index = ObjectIndex::open(temp_dir.path(), test_config())
            .expect("Failed to open file index");

        Self {
            index,
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the index directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// Closes and reopens a file-based index over the same directory.
    ///
    /// Uncommitted transactions are lost, committed mappings must survive.
    ///
    /// # Panics
    ///
    /// Panics for in-memory indexes, which have nothing to reopen.
    #[must_use]
    pub fn reopen(self) -> Self {
        let temp_dir = self.temp_dir.expect("Only file indexes can be reopened");
        self.index.close().expect("Failed to close index");
        drop(self.index);

        let index =
            ObjectIndex::open(temp_dir.path(), test_config()).expect("Failed to reopen index");
        Self {
            index,
            temp_dir: Some(temp_dir),
        }
    }
}

impl std::ops::Deref for TestIndex {
    type Target = ObjectIndex;

    fn deref(&self) -> &Self::Target {
        &self.index
    }
}

/// Configuration used by file fixtures: no fsync per write.
pub fn test_config() -> IndexConfig {
    IndexConfig::default().sync_on_write(false)
}

/// Runs a test with a temporary in-memory index.
///
/// # Example
///
/// ```rust,ignore
/// use resmap_testkit::with_memory_index;
///
/// #[test]
/// fn my_test() {
///     with_memory_index(|index| {
///         index.add_mapping(None, "a", "a", "obj").unwrap();
///     });
/// }
/// ```
pub fn with_memory_index<F, R>(f: F) -> R
where
    F: FnOnce(&ObjectIndex) -> R,
{
    let test_index = TestIndex::memory();
    f(&test_index.index)
}

/// Runs a test with a temporary log-backed index.
pub fn with_file_index<F, R>(f: F) -> R
where
    F: FnOnce(&ObjectIndex, &Path) -> R,
{
    let test_index = TestIndex::file();
    let path = test_index.path().expect("File index should have a path");
    f(&test_index.index, path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use resmap_core::TransactionId;

    /// Creates an index with `groups` committed groups of `children + 1`
    /// resources each.
    ///
    /// Group `g` has root `root-{g}`, children `root-{g}/child-{c}` and
    /// storage object `object-{g}`.
    pub fn populated_index(groups: usize, children: usize) -> TestIndex {
        let test_index = TestIndex::memory();
        let tx = TransactionId::generate();

        for g in 0..groups {
            let root = format!("root-{g}");
            let object = format!("object-{g}");
            test_index
                .add_mapping(Some(&tx), root.as_str(), root.as_str(), object.as_str())
                .expect("Failed to stage root");
            for c in 0..children {
                test_index
                    .add_mapping(
                        Some(&tx),
                        format!("{root}/child-{c}"),
                        root.as_str(),
                        object.as_str(),
                    )
                    .expect("Failed to stage child");
            }
        }

        test_index.commit(&tx).expect("Failed to commit");
        test_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_fixture_has_no_path() {
        let test_index = TestIndex::memory();
        assert!(test_index.path().is_none());
        assert!(test_index.get_mapping(None, "missing").is_err());
    }

    #[test]
    fn file_fixture_reopens() {
        let test_index = TestIndex::file();
        test_index.add_mapping(None, "a", "a", "obj").unwrap();

        let test_index = test_index.reopen();
        assert_eq!(
            test_index
                .get_mapping(None, "a")
                .unwrap()
                .storage_object_id()
                .as_str(),
            "obj"
        );
    }

    #[test]
    fn populated_index_groups_children() {
        let test_index = scenarios::populated_index(3, 2);
        assert_eq!(test_index.store().len().unwrap(), 9);

        let child = test_index.get_mapping(None, "root-2/child-1").unwrap();
        assert_eq!(child.root_resource_id().as_str(), "root-2");
        assert_eq!(child.storage_object_id().as_str(), "object-2");
    }

    #[test]
    fn with_file_index_exposes_directory() {
        with_file_index(|index, path| {
            index.add_mapping(None, "a", "a", "obj").unwrap();
            assert!(path.join("index.log").exists());
        });
    }
}
