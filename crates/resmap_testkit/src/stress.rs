//! Stress tests for the index.
//!
//! These verify behavior under heavy load and concurrent access. Every
//! writer thread owns its transactions and its keys, so after a run each
//! committed key must be visible with exactly the mapping its writer staged.

use resmap_core::{Mapping, ObjectIndex, TransactionId};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent writer threads.
    pub threads: usize,
    /// Transactions each writer runs.
    pub transactions_per_thread: usize,
    /// Mappings staged per transaction.
    pub mappings_per_transaction: usize,
    /// Every n-th transaction is rolled back instead of committed; 0 never.
    pub rollback_every: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            transactions_per_thread: 50,
            mappings_per_transaction: 8,
            rollback_every: 5,
        }
    }
}

impl StressConfig {
    fn is_rolled_back(&self, txn: usize) -> bool {
        self.rollback_every > 0 && (txn + 1) % self.rollback_every == 0
    }

    /// Resource id written by `thread` in transaction `txn`, slot `slot`.
    pub fn resource(thread: usize, txn: usize, slot: usize) -> String {
        format!("stress/t{thread}/x{txn}/r{slot}")
    }

    /// The mapping a writer stages for a resource of transaction `txn`.
    pub fn mapping(thread: usize, txn: usize) -> Mapping {
        let root = format!("stress/t{thread}/x{txn}");
        Mapping::new(root, format!("ocfl-t{thread}-x{txn}"))
    }

    /// Number of mappings that should be committed after a full run.
    pub fn expected_committed(&self) -> usize {
        let committed_txns = (0..self.transactions_per_thread)
            .filter(|txn| !self.is_rolled_back(*txn))
            .count();
        self.threads * committed_txns * self.mappings_per_transaction
    }
}

fn run_writer(index: &ObjectIndex, config: &StressConfig, thread: usize) -> (usize, usize) {
    let mut successful = 0usize;
    let mut failed = 0usize;

    for txn in 0..config.transactions_per_thread {
        let tx = TransactionId::generate();
        let mapping = StressConfig::mapping(thread, txn);

        for slot in 0..config.mappings_per_transaction {
            match index.add_mapping(
                Some(&tx),
                StressConfig::resource(thread, txn, slot),
                mapping.root_resource_id(),
                mapping.storage_object_id(),
            ) {
                Ok(_) => successful += 1,
                Err(_) => failed += 1,
            }
        }

        if config.is_rolled_back(txn) {
            index.rollback(&tx);
            successful += 1;
        } else {
            match index.commit(&tx) {
                Ok(_) => successful += 1,
                Err(_) => failed += 1,
            }
        }
    }

    (successful, failed)
}

/// Runs writer threads that each stage and commit their own transactions.
pub fn stress_concurrent_commits(index: &ObjectIndex, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    thread::scope(|scope| {
        for t in 0..config.threads {
            let successful = &successful;
            let failed = &failed;
            scope.spawn(move || {
                let (ok, err) = run_writer(index, config, t);
                successful.fetch_add(ok, Ordering::Relaxed);
                failed.fetch_add(err, Ordering::Relaxed);
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Runs writers alongside direct-mode readers.
///
/// Readers probe keys the writers will commit. A read may miss, but a hit
/// must carry the writer's mapping; anything else counts as a failed op.
pub fn stress_readers_during_commits(
    index: &ObjectIndex,
    config: &StressConfig,
    readers: usize,
) -> StressTestResult {
    let start = Instant::now();
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let writers_done = AtomicBool::new(false);

    thread::scope(|scope| {
        for r in 0..readers {
            let successful = &successful;
            let failed = &failed;
            let writers_done = &writers_done;
            scope.spawn(move || {
                let mut i = r;
                while !writers_done.load(Ordering::Acquire) {
                    let thread = i % config.threads.max(1);
                    let txn = i % config.transactions_per_thread.max(1);
                    let slot = i % config.mappings_per_transaction.max(1);
                    let resource = StressConfig::resource(thread, txn, slot);

                    match index.get_mapping(None, resource) {
                        Ok(mapping) if mapping == StressConfig::mapping(thread, txn) => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) if e.is_not_found() => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        _ => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    i = i.wrapping_add(readers.max(1));
                }
            });
        }

        let writers: Vec<_> = (0..config.threads)
            .map(|t| scope.spawn(move || run_writer(index, config, t)))
            .collect();
        for writer in writers {
            let (ok, err) = writer.join().expect("Writer thread panicked");
            successful.fetch_add(ok, Ordering::Relaxed);
            failed.fetch_add(err, Ordering::Relaxed);
        }
        writers_done.store(true, Ordering::Release);
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Checks every key a full run should have produced.
///
/// Returns the resources that are missing, carry the wrong mapping, or
/// were committed although their transaction was rolled back.
pub fn verify_commits(index: &ObjectIndex, config: &StressConfig) -> Vec<String> {
    let mut wrong = Vec::new();

    for thread in 0..config.threads {
        for txn in 0..config.transactions_per_thread {
            let expected = StressConfig::mapping(thread, txn);
            for slot in 0..config.mappings_per_transaction {
                let resource = StressConfig::resource(thread, txn, slot);
                let found = index.get_mapping(None, resource.as_str());
                let ok = if config.is_rolled_back(txn) {
                    found.is_err_and(|e| e.is_not_found())
                } else {
                    found.is_ok_and(|m| m == expected)
                };
                if !ok {
                    wrong.push(resource);
                }
            }
        }
    }

    wrong
}
