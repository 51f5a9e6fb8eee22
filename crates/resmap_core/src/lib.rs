//! # resmap Core
//!
//! A transactional index from resource identifiers to the storage objects
//! that hold them.
//!
//! Resources are grouped: a root resource and its descendants share one
//! storage object. For every resource the index records a [`Mapping`] of
//! its root resource and its storage object, and answers "where does this
//! resource live?" for any resource id.
//!
//! This crate provides:
//! - [`ObjectIndex`], the public service: add, get, remove, commit, rollback
//! - per-transaction overlays giving read-your-own-writes and isolation
//!   between in-flight transactions ([`overlay`])
//! - committed stores: [`MemoryStore`] and the durable, log-structured
//!   [`LogStore`] ([`store`])
//!
//! ## Example
//!
//! ```rust
//! use resmap_core::{ObjectIndex, TransactionId};
//!
//! let index = ObjectIndex::open_in_memory();
//! let tx = TransactionId::generate();
//!
//! index.add_mapping(Some(&tx), "parent", "parent", "ocfl-1").unwrap();
//! index.remove_mapping(Some(&tx), "parent").unwrap();
//! index.rollback(&tx);
//!
//! assert!(index.get_mapping(None, "parent").unwrap_err().is_not_found());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod index;
mod mapping;
pub mod overlay;
mod stats;
pub mod store;
mod types;

pub use config::IndexConfig;
pub use error::{IndexError, IndexResult};
pub use index::ObjectIndex;
pub use mapping::Mapping;
pub use overlay::{CommitSummary, Overlay, OverlayLookup, OverlayManager};
pub use stats::{IndexStats, StatsSnapshot};
pub use store::{CommittedStore, CompactionResult, LogStore, MemoryStore};
pub use types::{ResourceId, RootResourceId, StorageObjectId, TransactionId};
