//! Transaction overlays.
//!
//! Each in-flight transaction id owns an [`Overlay`]: the mappings it has
//! added and the resources it has removed, not yet visible to anyone else.
//! Reads under that id consult the overlay before the committed store,
//! which gives read-your-own-writes. Commit folds the overlay into the
//! committed store; rollback drops it.
//!
//! Isolation is read-committed: overlays never see each other, keys a
//! transaction has not touched resolve to whatever is committed right now,
//! and concurrent commits of the same key are last-writer-wins.

mod manager;
mod state;

pub use manager::{CommitSummary, OverlayManager};
pub use state::{Overlay, OverlayLookup};
