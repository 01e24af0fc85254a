//! Stress tests for the indexing engine.
//!
//! These runs drive the engine from several threads at once and count how
//! many operations behaved as the engine promises.

use crate::fixtures::{person, person_value, TestGrid};
use gridix_core::{SpaceName, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
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
        println!("\n=== {} ===", name);
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
    /// Number of operations per thread.
    pub operations: usize,
    /// Number of writer threads.
    pub threads: usize,
    /// Number of reader threads (for query tests).
    pub readers: usize,
    /// Distinct keys per writer thread.
    pub key_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 2_000,
            threads: 4,
            readers: 2,
            key_count: 100,
        }
    }
}

/// Key written by thread `t` for operation `i`. Threads never share keys.
fn thread_key(t: usize, i: usize, config: &StressConfig) -> Value {
    Value::Integer((t * config.key_count + i % config.key_count) as i64)
}

/// Run a sequential store stress test against `Person`.
pub fn stress_sequential_stores(grid: &TestGrid, config: &StressConfig) -> StressTestResult {
    let space = SpaceName::DEFAULT;
    let descriptor = person();
    grid.register(&space, &descriptor);

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let value = person_value(&format!("p{i}"), (i % 90) as i64, "Oslo");
        match grid.put(&space, &descriptor, thread_key(0, i, config), value, i as u64 + 1) {
            Ok(true) => successful += 1,
            _ => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run concurrent stores from several threads on disjoint keys.
///
/// Every store carries a fresh version, so any discarded store counts as a
/// failure.
pub fn stress_concurrent_stores(grid: &TestGrid, config: &StressConfig) -> StressTestResult {
    let space = SpaceName::DEFAULT;
    let descriptor = person();
    grid.register(&space, &descriptor);

    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..config.threads {
            let (space, descriptor) = (&space, &descriptor);
            let (successful, failed) = (&successful, &failed);
            scope.spawn(move || {
                for i in 0..config.operations {
                    let value = person_value(&format!("t{t}"), (i % 90) as i64, "Lima");
                    let key = thread_key(t, i, config);
                    match grid.put(space, descriptor, key, value, i as u64 + 1) {
                        Ok(true) => successful.fetch_add(1, Ordering::Relaxed),
                        _ => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Run field queries while writers move entries between age bands.
///
/// Writers flip entries between ages 10 and 60; readers ask for ages below
/// 30. A row whose age does not satisfy the predicate, or a query error,
/// counts as a failure. Only reader operations are counted.
pub fn stress_queries_during_writes(grid: &TestGrid, config: &StressConfig) -> StressTestResult {
    let space = SpaceName::DEFAULT;
    let descriptor = person();
    grid.register(&space, &descriptor);

    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..config.threads {
            let (space, descriptor) = (&space, &descriptor);
            scope.spawn(move || {
                for i in 0..config.operations {
                    let age = if i % 2 == 0 { 10 } else { 60 };
                    let value = person_value(&format!("w{t}"), age, "Pune");
                    let _ = grid.put(space, descriptor, thread_key(t, i, config), value, i as u64 + 1);
                }
            });
        }

        for _ in 0..config.readers {
            let space = &space;
            let (successful, failed) = (&successful, &failed);
            scope.spawn(move || {
                for _ in 0..config.operations / 10 {
                    let Ok(cursor) = grid.engine.query_fields(
                        space,
                        "SELECT _key, age FROM Person WHERE age < 30",
                        &[],
                        None,
                    ) else {
                        failed.fetch_add(1, Ordering::Relaxed);
                        continue;
                    };
                    let consistent = cursor.into_iter().all(|row| match row {
                        Ok(row) => matches!(row.get(1), Some(Value::Integer(age)) if *age < 30),
                        Err(_) => false,
                    });
                    if consistent {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
