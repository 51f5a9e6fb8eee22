//! # resmap Testkit
//!
//! Test utilities for the resmap index.
//!
//! This crate provides:
//! - Test fixtures over in-memory and directory-backed indexes
//! - Property-based test generators using proptest
//! - A reference model of the transactional index
//! - JSON scenario files and their runner
//! - Concurrent stress testing utilities
//!
//! ## Usage
//!
//! ```rust,ignore
//! use resmap_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_index() {
//!     with_memory_index(|index| {
//!         index.add_mapping(None, "a", "a", "obj").unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod model;
pub mod scenario;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
    pub use crate::scenario::*;
    pub use crate::stress::*;
}
