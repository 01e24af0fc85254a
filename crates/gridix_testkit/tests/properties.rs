//! Property tests over random mutation sequences.

use gridix_core::{SpaceName, Value, Version};
use gridix_testkit::prelude::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    /// Any mix of stores, removes and swaps leaves the engine agreeing with
    /// a model that applies only strictly newer versions.
    #[test]
    fn engine_agrees_with_model(ops in operation_sequence_strategy(1, 60)) {
        let mut harness = IntegrationHarness::new();
        for op in &ops {
            harness.apply(op);
        }
        harness.verify_all();
    }

    /// A stored value reads back through the field it was projected into.
    #[test]
    fn stored_fields_read_back(key in key_strategy(), value in person_value_strategy()) {
        let grid = TestGrid::new();
        let space = SpaceName::DEFAULT;
        grid.register(&space, &person());
        prop_assert!(grid.put(&space, &person(), key.clone(), value.clone(), 1).unwrap());

        let rows = grid.select(&space, "SELECT _key, name, age FROM Person", &[]);
        prop_assert_eq!(
            rows,
            vec![vec![key, value.get("name").cloned().unwrap(), value.get("age").cloned().unwrap()]]
        );
    }

    /// Whatever order versions arrive in, the entry ends at the highest one.
    #[test]
    fn highest_version_wins(versions in prop::collection::vec(1u64..50, 1..20)) {
        let grid = TestGrid::new();
        let space = SpaceName::DEFAULT;
        grid.register(&space, &person());
        for version in &versions {
            let value = person_value("v", *version as i64, "Oslo");
            grid.engine
                .store(&space, &person(), Value::Integer(1), value, Version::from_u64(*version), 0)
                .unwrap();
        }

        let max = *versions.iter().max().unwrap() as i64;
        let rows = grid.select(&space, "SELECT age FROM Person", &[]);
        prop_assert_eq!(rows, vec![vec![Value::Integer(max)]]);
    }

    /// After a remove, only versions newer than the last applied one bring
    /// the key back.
    #[test]
    fn removal_blocks_older_versions(applied in 1u64..20, late in 1u64..40) {
        let grid = TestGrid::new();
        let space = SpaceName::DEFAULT;
        grid.register(&space, &person());
        grid.put(&space, &person(), 1, person_value("a", 1, "Oslo"), applied).unwrap();
        prop_assert!(grid.delete(&space, 1).unwrap());

        let stored = grid.put(&space, &person(), 1, person_value("b", 2, "Oslo"), late).unwrap();
        prop_assert_eq!(stored, late > applied);
        prop_assert_eq!(grid.size(&space, &person()), i64::from(late > applied));
    }
}
