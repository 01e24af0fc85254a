//! Property-based test generators using proptest.
//!
//! Keys are drawn from a small pool so that generated operation sequences
//! hit the same keys repeatedly and exercise version ordering.

use crate::fixtures::person_value;
use gridix_core::Value;
use proptest::prelude::*;

/// Number of distinct keys the operation strategies draw from.
pub const KEY_POOL: i64 = 8;

/// Strategy for keys from the shared pool.
pub fn key_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        (0..KEY_POOL).prop_map(Value::Integer),
        (0..KEY_POOL).prop_map(|k| Value::Text(format!("k{k}"))),
    ]
}

/// Strategy for scalar values of every kind an index orders.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        "[a-z]{0,6}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..4).prop_map(Value::Bytes),
    ]
}

/// Strategy for short person names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}").expect("Invalid regex")
}

/// Strategy for `Person` values.
pub fn person_value_strategy() -> impl Strategy<Value = Value> {
    (name_strategy(), 0i64..100, prop::sample::select(vec!["Oslo", "Lima", "Pune"]))
        .prop_map(|(name, age, city)| person_value(&name, age, city))
}

/// A mutation fed to the engine.
#[derive(Debug, Clone)]
pub enum IndexOperation {
    /// Store a value.
    Store {
        /// Key to store.
        key: Value,
        /// Value to store.
        value: Value,
        /// Version counter.
        version: u64,
    },
    /// Remove a key.
    Remove {
        /// Key to remove.
        key: Value,
    },
    /// Swap a key's value out.
    Swap {
        /// Key to swap.
        key: Value,
    },
}

impl IndexOperation {
    /// Returns the key the operation touches.
    pub fn key(&self) -> &Value {
        match self {
            IndexOperation::Store { key, .. }
            | IndexOperation::Remove { key }
            | IndexOperation::Swap { key } => key,
        }
    }
}

/// Strategy for engine mutations.
pub fn index_operation_strategy() -> impl Strategy<Value = IndexOperation> {
    prop_oneof![
        4 => (key_strategy(), person_value_strategy(), 1u64..16)
            .prop_map(|(key, value, version)| IndexOperation::Store { key, value, version }),
        1 => key_strategy().prop_map(|key| IndexOperation::Remove { key }),
        1 => key_strategy().prop_map(|key| IndexOperation::Swap { key }),
    ]
}

/// Strategy for a sequence of engine mutations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<IndexOperation>> {
    prop::collection::vec(index_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn keys_come_from_the_pool(key in key_strategy()) {
            let in_pool = match &key {
                Value::Integer(k) => (0..KEY_POOL).contains(k),
                Value::Text(s) => s.starts_with('k'),
                _ => false,
            };
            prop_assert!(in_pool);
        }

        #[test]
        fn person_values_have_indexed_fields(value in person_value_strategy()) {
            prop_assert!(value.get("name").and_then(Value::as_text).is_some());
            prop_assert!(value.get("age").and_then(Value::as_integer).is_some());
        }
    }
}
