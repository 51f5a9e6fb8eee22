//! Property-based test generators using proptest.
//!
//! Identifiers are drawn from small pools so that generated operation
//! sequences collide on the same resources and transactions often.

use crate::model::IndexOp;
use proptest::prelude::*;
use resmap_core::{Mapping, ResourceId, TransactionId};

/// Number of distinct resources the op generators touch.
pub const RESOURCE_POOL: u8 = 12;

/// Number of transaction slots the op generators use.
pub const TX_SLOTS: u8 = 4;

/// Strategy for generating valid resource IDs in URI form.
pub fn resource_id_strategy() -> impl Strategy<Value = ResourceId> {
    prop::string::string_regex("info:fedora/[a-z][a-z0-9]{0,7}(/[a-z0-9]{1,8}){0,3}")
        .expect("Invalid regex")
        .prop_map(ResourceId::new)
}

/// Strategy for generating transaction IDs.
pub fn transaction_id_strategy() -> impl Strategy<Value = TransactionId> {
    prop::string::string_regex("[a-f0-9]{8}-[a-f0-9]{4}")
        .expect("Invalid regex")
        .prop_map(TransactionId::new)
}

/// Strategy for generating mappings with arbitrary storage object ids.
pub fn mapping_strategy() -> impl Strategy<Value = Mapping> {
    (
        resource_id_strategy(),
        prop::string::string_regex("ocfl-[a-z0-9]{1,12}").expect("Invalid regex"),
    )
        .prop_map(|(root, object)| Mapping::new(root, object))
}

/// Strategy for a resource name from the shared pool.
pub fn pooled_resource_strategy() -> impl Strategy<Value = String> {
    (0..RESOURCE_POOL).prop_map(|n| format!("info:fedora/r{n}"))
}

/// Strategy for a transaction slot, or `None` for direct mode.
pub fn tx_slot_strategy() -> impl Strategy<Value = Option<u8>> {
    prop_oneof![
        1 => Just(None),
        4 => (0..TX_SLOTS).prop_map(Some),
    ]
}

/// Strategy for a single index operation.
pub fn index_op_strategy() -> impl Strategy<Value = IndexOp> {
    prop_oneof![
        4 => (tx_slot_strategy(), pooled_resource_strategy(), 0u8..4).prop_map(
            |(tx, resource, version)| IndexOp::Add {
                tx,
                root: resource.clone(),
                object: format!("ocfl-{version}"),
                resource,
            }
        ),
        4 => (tx_slot_strategy(), pooled_resource_strategy())
            .prop_map(|(tx, resource)| IndexOp::Get { tx, resource }),
        2 => (tx_slot_strategy(), pooled_resource_strategy())
            .prop_map(|(tx, resource)| IndexOp::Remove { tx, resource }),
        1 => (0..TX_SLOTS).prop_map(IndexOp::Commit),
        1 => (0..TX_SLOTS).prop_map(IndexOp::Rollback),
    ]
}

/// Strategy for a sequence of index operations.
pub fn index_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<IndexOp>> {
    prop::collection::vec(index_op_strategy(), 0..max_len)
}
