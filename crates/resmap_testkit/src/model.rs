//! A reference model of the transactional index.
//!
//! The model is the simplest thing that behaves like [`ObjectIndex`]: a
//! committed map plus one map of staged changes per transaction. Property
//! tests drive both with the same [`IndexOp`] sequence and compare every
//! [`Outcome`].

use resmap_core::{IndexError, Mapping, ObjectIndex, ResourceId, TransactionId};
use std::collections::HashMap;

/// One call against the index.
///
/// Transactions are small slot numbers so generated sequences reuse them;
/// `None` means direct mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOp {
    /// `add_mapping`.
    Add {
        /// Transaction slot.
        tx: Option<u8>,
        /// Resource being mapped.
        resource: String,
        /// Root of its group.
        root: String,
        /// Storage object holding the group.
        object: String,
    },
    /// `get_mapping`.
    Get {
        /// Transaction slot.
        tx: Option<u8>,
        /// Resource to look up.
        resource: String,
    },
    /// `remove_mapping`.
    Remove {
        /// Transaction slot.
        tx: Option<u8>,
        /// Resource to remove.
        resource: String,
    },
    /// `commit`.
    Commit(u8),
    /// `rollback`.
    Rollback(u8),
}

/// What an operation returned, reduced to something comparable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The call succeeded without a value.
    Done,
    /// A lookup found this mapping.
    Found(Mapping),
    /// A lookup failed with `MappingNotFound`.
    NotFound,
}

/// Transaction id used for a slot.
pub fn slot_tx(slot: u8) -> TransactionId {
    TransactionId::new(format!("tx-{slot}"))
}

/// Reference model of committed state and per-transaction overlays.
#[derive(Debug, Default, Clone)]
pub struct ReferenceModel {
    committed: HashMap<String, Mapping>,
    staged: HashMap<u8, HashMap<String, Option<Mapping>>>,
}

impl ReferenceModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an operation and returns what the index should return.
    pub fn apply(&mut self, op: &IndexOp) -> Outcome {
        match op {
            IndexOp::Add {
                tx,
                resource,
                root,
                object,
            } => {
                let mapping = Mapping::new(root.as_str(), object.as_str());
                match tx {
                    Some(slot) => {
                        self.staged
                            .entry(*slot)
                            .or_default()
                            .insert(resource.clone(), Some(mapping.clone()));
                    }
                    None => {
                        self.committed.insert(resource.clone(), mapping.clone());
                    }
                }
                Outcome::Found(mapping)
            }
            IndexOp::Get { tx, resource } => {
                let staged = tx
                    .and_then(|slot| self.staged.get(&slot))
                    .and_then(|changes| changes.get(resource));
                let visible = match staged {
                    Some(change) => change.clone(),
                    None => self.committed.get(resource).cloned(),
                };
                visible.map_or(Outcome::NotFound, Outcome::Found)
            }
            IndexOp::Remove { tx, resource } => {
                match tx {
                    Some(slot) => {
                        self.staged
                            .entry(*slot)
                            .or_default()
                            .insert(resource.clone(), None);
                    }
                    None => {
                        self.committed.remove(resource);
                    }
                }
                Outcome::Done
            }
            IndexOp::Commit(slot) => {
                for (resource, change) in self.staged.remove(slot).unwrap_or_default() {
                    match change {
                        Some(mapping) => {
                            self.committed.insert(resource, mapping);
                        }
                        None => {
                            self.committed.remove(&resource);
                        }
                    }
                }
                Outcome::Done
            }
            IndexOp::Rollback(slot) => {
                self.staged.remove(slot);
                Outcome::Done
            }
        }
    }

    /// The committed mapping for `resource`, if any.
    pub fn committed(&self, resource: &str) -> Option<&Mapping> {
        self.committed.get(resource)
    }

    /// Number of committed mappings.
    pub fn committed_len(&self) -> usize {
        self.committed.len()
    }

    /// Slots with staged changes.
    pub fn open_slots(&self) -> Vec<u8> {
        let mut slots: Vec<u8> = self.staged.keys().copied().collect();
        slots.sort_unstable();
        slots
    }
}

/// Applies an operation to a real index.
///
/// # Errors
///
/// Returns any error other than `MappingNotFound`, which becomes
/// [`Outcome::NotFound`].
pub fn apply_to_index(index: &ObjectIndex, op: &IndexOp) -> Result<Outcome, IndexError> {
    let tx_of = |slot: &Option<u8>| slot.map(slot_tx);

    match op {
        IndexOp::Add {
            tx,
            resource,
            root,
            object,
        } => {
            let tx = tx_of(tx);
            index
                .add_mapping(tx.as_ref(), resource.as_str(), root.as_str(), object.as_str())
                .map(Outcome::Found)
        }
        IndexOp::Get { tx, resource } => {
            let tx = tx_of(tx);
            match index.get_mapping(tx.as_ref(), resource.as_str()) {
                Ok(mapping) => Ok(Outcome::Found(mapping)),
                Err(e) if e.is_not_found() => Ok(Outcome::NotFound),
                Err(e) => Err(e),
            }
        }
        IndexOp::Remove { tx, resource } => {
            let tx = tx_of(tx);
            index
                .remove_mapping(tx.as_ref(), resource.as_str())
                .map(|()| Outcome::Done)
        }
        IndexOp::Commit(slot) => index.commit(&slot_tx(*slot)).map(|_| Outcome::Done),
        IndexOp::Rollback(slot) => {
            index.rollback(&slot_tx(*slot));
            Ok(Outcome::Done)
        }
    }
}

/// Asserts that every committed mapping in the model is visible in the
/// index through direct reads, and that the store holds nothing else.
///
/// # Panics
///
/// Panics on the first disagreement.
pub fn assert_committed_matches(model: &ReferenceModel, index: &ObjectIndex) {
    for (resource, expected) in &model.committed {
        let actual = index
            .get_mapping(None, ResourceId::new(resource.as_str()))
            .unwrap_or_else(|e| panic!("committed {resource} not readable: {e}"));
        assert_eq!(&actual, expected, "mapping mismatch for {resource}");
    }
    assert_eq!(
        index.store().len().expect("Failed to count store"),
        model.committed_len(),
        "committed store size differs from model"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(tx: Option<u8>, resource: &str, object: &str) -> IndexOp {
        IndexOp::Add {
            tx,
            resource: resource.into(),
            root: resource.into(),
            object: object.into(),
        }
    }

    fn get(tx: Option<u8>, resource: &str) -> IndexOp {
        IndexOp::Get {
            tx,
            resource: resource.into(),
        }
    }

    #[test]
    fn model_isolates_slots() {
        let mut model = ReferenceModel::new();
        model.apply(&add(Some(1), "a", "x"));

        assert_eq!(model.apply(&get(Some(2), "a")), Outcome::NotFound);
        assert_eq!(model.apply(&get(None, "a")), Outcome::NotFound);
        assert_eq!(
            model.apply(&get(Some(1), "a")),
            Outcome::Found(Mapping::new("a", "x"))
        );
        assert_eq!(model.open_slots(), vec![1]);
    }

    #[test]
    fn model_tombstone_hides_committed() {
        let mut model = ReferenceModel::new();
        model.apply(&add(None, "a", "x"));
        model.apply(&IndexOp::Remove {
            tx: Some(1),
            resource: "a".into(),
        });

        assert_eq!(model.apply(&get(Some(1), "a")), Outcome::NotFound);
        assert!(model.committed("a").is_some());

        model.apply(&IndexOp::Commit(1));
        assert!(model.committed("a").is_none());
    }

    #[test]
    fn model_agrees_with_index_on_short_sequence() {
        let index = ObjectIndex::open_in_memory();
        let mut model = ReferenceModel::new();
        let ops = [
            add(Some(1), "a", "x"),
            add(None, "b", "y"),
            get(Some(1), "a"),
            get(None, "a"),
            IndexOp::Remove {
                tx: Some(2),
                resource: "b".into(),
            },
            get(Some(2), "b"),
            IndexOp::Commit(1),
            IndexOp::Rollback(2),
            get(None, "a"),
            get(None, "b"),
        ];

        for op in &ops {
            let expected = model.apply(op);
            assert_eq!(apply_to_index(&index, op).unwrap(), expected, "{op:?}");
        }
        assert_committed_matches(&model, &index);
    }
}
