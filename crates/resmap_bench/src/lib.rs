//! Benchmark utilities.

#![warn(missing_docs)]

use rand::Rng;
use resmap_core::{IndexConfig, ObjectIndex, TransactionId};

/// Generates `count` resource ids spread over groups of `group_size`.
///
/// Returns `(resource, root)` pairs.
pub fn grouped_resources(count: usize, group_size: usize) -> Vec<(String, String)> {
    let group_size = group_size.max(1);
    (0..count)
        .map(|i| {
            let root = format!("info:fedora/bench/g{}", i / group_size);
            let resource = if i % group_size == 0 {
                root.clone()
            } else {
                format!("{root}/r{i}")
            };
            (resource, root)
        })
        .collect()
}

/// A random storage object id.
pub fn random_object_id() -> String {
    let mut rng = rand::thread_rng();
    format!("ocfl-{:016x}", rng.gen::<u64>())
}

/// Commits `resources` into `index` in one transaction.
///
/// # Panics
///
/// Panics if staging or the commit fails.
pub fn populate(index: &ObjectIndex, resources: &[(String, String)]) {
    let tx = TransactionId::generate();
    for (resource, root) in resources {
        index
            .add_mapping(Some(&tx), resource.as_str(), root.as_str(), format!("ocfl-{root}"))
            .expect("Failed to stage mapping");
    }
    index.commit(&tx).expect("Failed to commit");
}

/// Index configuration for benchmarks: no fsync, no auto-compaction.
pub fn bench_config() -> IndexConfig {
    IndexConfig::default()
        .sync_on_write(false)
        .compact_min_records(0)
}
