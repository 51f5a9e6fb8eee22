//! Committed stores.
//!
//! A committed store holds the globally visible resource → mapping entries.
//! It has no notion of transactions: every call is applied on its own and is
//! atomic for the single key it touches. Transaction overlays live in
//! [`crate::overlay`] and are folded into a store on commit.
//!
//! ## Implementations
//!
//! - [`MemoryStore`] - a locked `HashMap`, gone when the process exits
//! - [`LogStore`] - an append-only record log over a
//!   [`StorageBackend`](resmap_storage::StorageBackend), replayed on open
//!
//! ## Log Record Format
//!
//! ```text
//! | record_len (4) | kind (1) | key_len (4) | key | root_len (4) | root | object_len (4) | object | crc32 (4) |
//! ```
//!
//! Kinds:
//! - `0x01` = put
//! - `0x02` = delete (root and object are empty)

mod dir;
mod log;
mod memory;
mod record;

pub use log::{CompactionResult, LogStore};
pub use memory::MemoryStore;

use crate::error::IndexResult;
use crate::mapping::Mapping;
use crate::types::ResourceId;

/// Durable, globally visible resource → mapping storage.
///
/// # Invariants
///
/// - `put` replaces any previous mapping for the key
/// - `get` reports absence as `Ok(None)`, never as an error
/// - `delete` of an absent key succeeds without effect
/// - every call is atomic for its key; nothing spans keys
/// - after `close`, every call fails with
///   [`IndexError::StoreClosed`](crate::IndexError::StoreClosed)
pub trait CommittedStore: Send + Sync {
    /// Inserts or replaces the mapping for `resource_id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write cannot be made.
    fn put(&self, resource_id: &ResourceId, mapping: &Mapping) -> IndexResult<()>;

    /// Looks up the mapping for `resource_id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be read.
    fn get(&self, resource_id: &ResourceId) -> IndexResult<Option<Mapping>>;

    /// Removes the mapping for `resource_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the removal cannot be made.
    fn delete(&self, resource_id: &ResourceId) -> IndexResult<()>;

    /// Removes every mapping.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be emptied.
    fn clear(&self) -> IndexResult<()>;

    /// Returns the number of live mappings.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::StoreClosed`](crate::IndexError::StoreClosed)
    /// after close.
    fn len(&self) -> IndexResult<usize>;

    /// Returns `true` if the store holds no mappings.
    ///
    /// # Errors
    ///
    /// Same as [`CommittedStore::len`].
    fn is_empty(&self) -> IndexResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Makes every write so far durable.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the sync fails.
    fn flush(&self) -> IndexResult<()> {
        Ok(())
    }

    /// Flushes and closes the store. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the final flush fails.
    fn close(&self) -> IndexResult<()>;

    /// Returns `true` until [`CommittedStore::close`] has been called.
    fn is_open(&self) -> bool;
}
