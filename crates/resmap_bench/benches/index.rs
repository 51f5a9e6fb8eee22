//! Index operation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use resmap_bench::{grouped_resources, populate, random_object_id};
use resmap_core::{ObjectIndex, TransactionId};

/// Benchmark committed lookups at different index sizes.
fn bench_committed_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("committed_lookup");

    for size in [100, 10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let index = ObjectIndex::open_in_memory();
            let resources = grouped_resources(size, 16);
            populate(&index, &resources);
            let mut rng = rand::thread_rng();

            b.iter(|| {
                let (resource, _) = &resources[rng.gen_range(0..resources.len())];
                black_box(index.get_mapping(None, resource.as_str()).unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark lookups answered by a transaction's own overlay.
fn bench_overlay_lookup(c: &mut Criterion) {
    let index = ObjectIndex::open_in_memory();
    let committed = grouped_resources(10_000, 16);
    populate(&index, &committed);

    let tx = TransactionId::generate();
    for (resource, root) in committed.iter().step_by(10) {
        index
            .add_mapping(Some(&tx), resource.as_str(), root.as_str(), random_object_id())
            .unwrap();
    }

    c.bench_function("overlay_lookup_hit", |b| {
        let mut rng = rand::thread_rng();
        b.iter(|| {
            let i = rng.gen_range(0..committed.len() / 10) * 10;
            black_box(index.get_mapping(Some(&tx), committed[i].0.as_str()).unwrap());
        });
    });

    c.bench_function("overlay_lookup_fallthrough", |b| {
        let mut rng = rand::thread_rng();
        b.iter(|| {
            let i = rng.gen_range(0..committed.len() / 10) * 10 + 1;
            black_box(index.get_mapping(Some(&tx), committed[i].0.as_str()).unwrap());
        });
    });
}

/// Benchmark staging and committing transactions of different sizes.
fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit");

    for batch_size in [1, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let index = ObjectIndex::open_in_memory();
                let resources = grouped_resources(batch_size, 8);
                let object = random_object_id();

                b.iter(|| {
                    let tx = TransactionId::generate();
                    for (resource, root) in &resources {
                        index
                            .add_mapping(Some(&tx), resource.as_str(), root.as_str(), object.as_str())
                            .unwrap();
                    }
                    black_box(index.commit(&tx).unwrap());
                });
            },
        );
    }
    group.finish();
}

/// Benchmark staging then rolling back.
fn bench_rollback(c: &mut Criterion) {
    let index = ObjectIndex::open_in_memory();
    let resources = grouped_resources(100, 8);

    c.bench_function("stage_100_rollback", |b| {
        b.iter(|| {
            let tx = TransactionId::generate();
            for (resource, root) in &resources {
                index
                    .add_mapping(Some(&tx), resource.as_str(), root.as_str(), "ocfl-rollback")
                    .unwrap();
            }
            index.rollback(black_box(&tx));
        });
    });
}

criterion_group!(
    benches,
    bench_committed_lookup,
    bench_overlay_lookup,
    bench_commit,
    bench_rollback,
);
criterion_main!(benches);
