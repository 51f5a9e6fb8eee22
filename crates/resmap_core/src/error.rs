//! Error types for the index.

use crate::types::ResourceId;
use std::io;
use thiserror::Error;

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors returned by the index and its committed stores.
///
/// [`IndexError::MappingNotFound`] is the only domain error. Everything else
/// means the committed store could not do its job; the index never retries
/// and never swallows these.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The resource has no mapping in the state visible to the caller.
    #[error("no mapping found for resource {resource_id}")]
    MappingNotFound {
        /// The resource that was looked up.
        resource_id: ResourceId,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] resmap_storage::StorageError),

    /// I/O error outside the backend (directory, lock file, rename).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The committed log holds bytes that cannot be decoded.
    #[error("index log corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// Another open store holds the index directory.
    #[error("index locked: another process has exclusive access")]
    StoreLocked,

    /// The committed store has been closed.
    #[error("index store is closed")]
    StoreClosed,

    /// A caller broke the API contract.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl IndexError {
    /// Creates a mapping not found error.
    pub fn mapping_not_found(resource_id: impl Into<ResourceId>) -> Self {
        Self::MappingNotFound {
            resource_id: resource_id.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns `true` for [`IndexError::MappingNotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::MappingNotFound { .. })
    }

    /// Returns `true` when the committed store failed or is unusable.
    ///
    /// Callers own the retry policy for these.
    #[must_use]
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Storage(_)
                | Self::Io(_)
                | Self::Corruption { .. }
                | Self::StoreLocked
                | Self::StoreClosed
        )
    }
}
