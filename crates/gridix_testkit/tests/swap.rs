//! Swapped values stay queryable and reload transparently.

use gridix_codec::to_cbor;
use gridix_core::{CoreError, SpaceName, UnswapOutcome, Value};
use gridix_testkit::prelude::*;

#[test]
fn swapped_entries_answer_queries_unchanged() {
    let grid = scenarios::populated_grid(40);
    let space = SpaceName::DEFAULT;
    let before_fields = grid.select(&space, "SELECT _key, name, age FROM Person ORDER BY age", &[]);
    let before_rows = grid.keys(&space, &person(), "age > 40", &[]);

    for key in (0..40).step_by(3) {
        assert!(grid.engine.on_swap(&space, &Value::Integer(key)).unwrap());
    }
    assert_eq!(grid.engine.stats().snapshot().swaps, 14);

    assert_eq!(
        grid.select(&space, "SELECT _key, name, age FROM Person ORDER BY age", &[]),
        before_fields
    );
    assert_eq!(grid.keys(&space, &person(), "age > 40", &[]), before_rows);
    assert_eq!(grid.size(&space, &person()), 40);
}

#[test]
fn row_queries_load_swapped_values_from_the_cache() {
    let grid = scenarios::populated_grid(3);
    let space = SpaceName::DEFAULT;
    grid.engine.on_swap(&space, &Value::Integer(1)).unwrap();

    let rows: Vec<_> = grid
        .engine
        .query(&space, "_key = 1", &[], &person(), None)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(rows, vec![(Value::Integer(1), person_value("person-1", 21, "Lima"))]);

    // A swapped key the cache no longer holds is skipped.
    grid.cache.remove(&space, &Value::Integer(1));
    assert!(grid.keys(&space, &person(), "_key = 1", &[]).is_empty());
}

#[test]
fn swapped_values_need_a_cache_to_load() {
    let grid = scenarios::populated_grid(2);
    let space = SpaceName::DEFAULT;
    grid.engine.on_swap(&space, &Value::Integer(0)).unwrap();
    grid.context
        .components()
        .remove(gridix_core::ComponentKind::Cache);

    let mut rows = grid.engine.query(&space, "", &[], &person(), None).unwrap();
    assert!(matches!(
        rows.next(),
        Some(Err(CoreError::ComponentMissing(gridix_core::ComponentKind::Cache)))
    ));

    // Field queries never need the value.
    assert_eq!(grid.select(&space, "SELECT age FROM Person", &[]).len(), 2);
}

#[test]
fn unswap_outcomes() {
    let grid = scenarios::populated_grid(2);
    let space = SpaceName::DEFAULT;
    let key = Value::Integer(0);
    let original = person_value("person-0", 20, "Oslo");

    assert_eq!(
        grid.engine.on_unswap(&space, &key, original.clone()).unwrap(),
        UnswapOutcome::Unchanged
    );

    grid.engine.on_swap(&space, &key).unwrap();
    assert!(!grid.engine.on_swap(&space, &key).unwrap());
    let bytes = to_cbor(&original).unwrap();
    assert_eq!(
        grid.engine.on_unswap_bytes(&space, &key, &bytes).unwrap(),
        UnswapOutcome::Restored
    );

    let changed = person_value("person-0", 99, "Oslo");
    assert_eq!(
        grid.engine.on_unswap(&space, &key, changed).unwrap(),
        UnswapOutcome::Refreshed
    );
    assert_eq!(
        grid.keys(&space, &person(), "age = 99", &[]),
        vec![key.clone()]
    );

    assert_eq!(
        grid.engine
            .on_unswap(&space, &Value::Integer(77), original)
            .unwrap(),
        UnswapOutcome::Missing
    );
    assert!(grid.engine.on_unswap_bytes(&space, &key, &[0xff, 0x00]).is_err());
}

#[test]
fn swap_of_removed_key_is_ignored() {
    let grid = scenarios::populated_grid(2);
    let space = SpaceName::DEFAULT;
    grid.delete(&space, 1).unwrap();
    assert!(!grid.engine.on_swap(&space, &Value::Integer(1)).unwrap());
    assert_eq!(
        grid.engine
            .on_unswap(&space, &Value::Integer(1), person_value("person-1", 21, "Lima"))
            .unwrap(),
        UnswapOutcome::Missing
    );
    assert_eq!(grid.size(&space, &person()), 1);
}
