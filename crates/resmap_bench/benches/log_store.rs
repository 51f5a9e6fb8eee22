//! Log-backed store benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use resmap_bench::{bench_config, grouped_resources, populate};
use resmap_core::{CommittedStore, LogStore, Mapping, ObjectIndex, ResourceId};
use tempfile::tempdir;

/// Benchmark appends to the log, with and without fsync.
fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_append");
    group.throughput(Throughput::Elements(1));

    for sync in [false, true] {
        group.bench_with_input(BenchmarkId::new("sync", sync), &sync, |b, &sync| {
            let dir = tempdir().unwrap();
            let store = LogStore::open(dir.path(), bench_config().sync_on_write(sync)).unwrap();
            let mapping = Mapping::new("info:fedora/bench", "ocfl-bench");
            let mut i = 0u64;

            b.iter(|| {
                let key = ResourceId::new(format!("info:fedora/bench/r{i}"));
                store.put(&key, black_box(&mapping)).unwrap();
                i += 1;
            });
        });
    }
    group.finish();
}

/// Benchmark reopening (replaying) logs of different sizes.
fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_replay");
    group.sample_size(20);

    for size in [1_000, 10_000, 50_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let dir = tempdir().unwrap();
            {
                let index = ObjectIndex::open(dir.path(), bench_config()).unwrap();
                populate(&index, &grouped_resources(size, 16));
                index.close().unwrap();
            }

            b.iter(|| {
                let store = LogStore::open(dir.path(), bench_config()).unwrap();
                black_box(store.len().unwrap());
                store.close().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark compacting a log where every key was overwritten several times.
fn bench_compaction(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_compaction");
    group.sample_size(10);

    for live in [1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(live), live, |b, &live| {
            let dir = tempdir().unwrap();
            let store = LogStore::open(dir.path(), bench_config()).unwrap();
            let keys: Vec<ResourceId> = (0..live)
                .map(|i| ResourceId::new(format!("info:fedora/bench/r{i}")))
                .collect();

            b.iter(|| {
                for version in 0..4 {
                    let mapping = Mapping::new("info:fedora/bench", format!("ocfl-v{version}"));
                    for key in &keys {
                        store.put(key, &mapping).unwrap();
                    }
                }
                black_box(store.compact().unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_append, bench_replay, bench_compaction);
criterion_main!(benches);
