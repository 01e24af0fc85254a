//! Concurrent writers, readers and schema changes.

use gridix_core::{SpaceName, Value, Version};
use gridix_testkit::prelude::*;
use std::sync::Barrier;
use std::thread;

#[test]
fn concurrent_stores_of_one_key_keep_the_newest() {
    let grid = TestGrid::new();
    let space = SpaceName::DEFAULT;
    grid.register(&space, &person());
    let barrier = Barrier::new(4);

    thread::scope(|scope| {
        for t in 0..4u64 {
            let (grid, space, barrier) = (&grid, &space, &barrier);
            scope.spawn(move || {
                barrier.wait();
                // Thread t owns versions t+1, t+5, t+9, ...
                for round in 0..50u64 {
                    let version = round * 4 + t + 1;
                    let value = person_value("racer", version as i64, "Oslo");
                    grid.engine
                        .store(space, &person(), Value::Integer(1), value, Version::from_u64(version), 0)
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(
        grid.select(&space, "SELECT age FROM Person", &[]),
        vec![vec![Value::Integer(200)]]
    );
    let stats = grid.engine.stats().snapshot();
    assert_eq!(stats.stores + stats.stale_updates, 200);
}

#[test]
fn remove_racing_stores_never_resurrects_older_versions() {
    let grid = TestGrid::new();
    let space = SpaceName::DEFAULT;
    grid.register(&space, &person());
    grid.put(&space, &person(), 1, person_value("a", 1, "Oslo"), 100).unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            for version in 1..100u64 {
                let _ = grid.put(&space, &person(), 1, person_value("late", 2, "Oslo"), version);
            }
        });
        scope.spawn(|| {
            grid.delete(&space, 1).unwrap();
        });
    });

    assert_eq!(grid.size(&space, &person()), 0);
}

#[test]
fn readers_never_see_torn_entries() {
    let grid = TestGrid::new();
    let config = StressConfig {
        operations: 400,
        threads: 3,
        readers: 3,
        key_count: 30,
    };
    let result = stress_queries_during_writes(&grid, &config);
    assert_eq!(result.failed_ops, 0, "inconsistent rows: {result:?}");
    assert_eq!(grid.engine.stats().open_scans(), 0);
}

#[test]
fn disjoint_writers_all_land() {
    let grid = TestGrid::new();
    let config = StressConfig {
        operations: 300,
        threads: 4,
        readers: 0,
        key_count: 50,
    };
    let result = stress_concurrent_stores(&grid, &config);
    assert_eq!(result.failed_ops, 0);
    assert_eq!(grid.size(&SpaceName::DEFAULT, &person()), 200);
}

#[test]
fn queries_survive_concurrent_unregister() {
    let grid = scenarios::populated_grid(500);
    let space = SpaceName::DEFAULT;

    thread::scope(|scope| {
        let reader = scope.spawn(|| {
            let mut seen = 0usize;
            for _ in 0..20 {
                let Ok(cursor) = grid.engine.query_fields(&space, "SELECT _key FROM Person", &[], None)
                else {
                    break;
                };
                for row in cursor {
                    if row.is_err() {
                        break;
                    }
                    seen += 1;
                }
            }
            seen
        });
        scope.spawn(|| grid.engine.unregister_type(&space, &person()).unwrap());
        reader.join().unwrap();
    });

    assert_eq!(grid.engine.stats().open_scans(), 0);
}
