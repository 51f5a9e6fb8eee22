//! # resmap Storage
//!
//! Byte-level storage backends for the resmap committed index.
//!
//! A backend is an **opaque append-only byte store**. It knows nothing about
//! index records, checksums or keys; `resmap_core` owns the log format and
//! only asks the backend to append bytes, read them back, make them durable
//! and cut a torn tail off after a crash.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral, for tests and throwaway indexes
//! - [`FileBackend`] - a single OS file
//!
//! ## Example
//!
//! ```rust
//! use resmap_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"record").unwrap();
//! assert_eq!(backend.read_at(offset, 6).unwrap(), b"record");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
