//! Model-checked integration harness.
//!
//! Applies mutations to a [`TestGrid`] and to a plain map model side by
//! side, then checks that queries over the engine agree with the model.

use crate::fixtures::{person, TestGrid};
use crate::generators::IndexOperation;
use gridix_core::{SpaceName, TypeDescriptor, Value, Version};
use std::collections::BTreeMap;

/// What the model remembers about a key.
#[derive(Debug, Clone)]
enum ModelEntry {
    Live {
        version: u64,
        value: Value,
        swapped: bool,
    },
    Removed { version: Option<u64> },
}

/// A test harness that mirrors engine mutations in a model.
pub struct IntegrationHarness {
    /// The grid under test.
    pub grid: TestGrid,
    space: SpaceName,
    descriptor: TypeDescriptor,
    model: BTreeMap<Value, ModelEntry>,
}

impl IntegrationHarness {
    /// Creates a harness over `Person` in the default space.
    pub fn new() -> Self {
        let grid = TestGrid::new();
        let space = SpaceName::DEFAULT;
        let descriptor = person();
        grid.register(&space, &descriptor);
        Self {
            grid,
            space,
            descriptor,
            model: BTreeMap::new(),
        }
    }

    /// Applies one operation to the engine and the model.
    pub fn apply(&mut self, op: &IndexOperation) {
        let engine = &self.grid.engine;
        match op {
            IndexOperation::Store {
                key,
                value,
                version,
            } => {
                let stored = engine
                    .store(
                        &self.space,
                        &self.descriptor,
                        key.clone(),
                        value.clone(),
                        Version::from_u64(*version),
                        0,
                    )
                    .expect("Failed to store");
                let expected = match self.model.get(key) {
                    Some(ModelEntry::Live { version: last, .. })
                    | Some(ModelEntry::Removed {
                        version: Some(last),
                    }) => version > last,
                    Some(ModelEntry::Removed { version: None }) | None => true,
                };
                assert_eq!(stored, expected, "store of {key} at version {version}");
                if stored {
                    self.grid.cache.put(
                        &self.space,
                        &self.descriptor.name,
                        key.clone(),
                        value.clone(),
                        Version::from_u64(*version),
                    );
                    self.model.insert(
                        key.clone(),
                        ModelEntry::Live {
                            version: *version,
                            value: value.clone(),
                            swapped: false,
                        },
                    );
                }
            }
            IndexOperation::Remove { key } => {
                let removed = engine.remove(&self.space, key).expect("Failed to remove");
                let last = match self.model.get(key) {
                    Some(ModelEntry::Live { version, .. }) => Some(*version),
                    Some(ModelEntry::Removed { version }) => *version,
                    None => None,
                };
                let was_live = matches!(self.model.get(key), Some(ModelEntry::Live { .. }));
                assert_eq!(removed, was_live, "remove of {key}");
                self.grid.cache.remove(&self.space, key);
                self.model
                    .insert(key.clone(), ModelEntry::Removed { version: last });
            }
            IndexOperation::Swap { key } => {
                let swapped = engine.on_swap(&self.space, key).expect("Failed to swap");
                let resident = match self.model.get_mut(key) {
                    Some(ModelEntry::Live { swapped, .. }) => !std::mem::replace(swapped, true),
                    _ => false,
                };
                assert_eq!(swapped, resident, "swap of {key}");
            }
        }
    }

    /// Returns the live keys of the model in key order.
    pub fn live_keys(&self) -> Vec<Value> {
        self.model
            .iter()
            .filter(|(_, entry)| matches!(entry, ModelEntry::Live { .. }))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Checks that size, row queries and field queries agree with the model.
    pub fn verify_all(&self) {
        let live = self.live_keys();
        assert_eq!(
            self.grid.size(&self.space, &self.descriptor),
            live.len() as i64,
            "size disagrees with model"
        );

        let rows: Vec<(Value, Value)> = self
            .grid
            .engine
            .query(&self.space, "ORDER BY _key", &[], &self.descriptor, None)
            .expect("Failed to query rows")
            .collect::<Result<_, _>>()
            .expect("Row query failed");
        let expected: Vec<(Value, Value)> = self
            .model
            .iter()
            .filter_map(|(key, entry)| match entry {
                ModelEntry::Live { value, .. } => Some((key.clone(), value.clone())),
                ModelEntry::Removed { .. } => None,
            })
            .collect();
        assert_eq!(rows, expected, "row query disagrees with model");

        for (key, value) in &expected {
            let ages = self.grid.select(
                &self.space,
                "SELECT age FROM Person WHERE _key = ?",
                &[key.clone()],
            );
            assert_eq!(ages, vec![vec![value.get("age").cloned().unwrap_or(Value::Null)]]);
        }
    }

    /// Returns the count of keys the model tracks, live or removed.
    pub fn tracked_count(&self) -> usize {
        self.model.len()
    }
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::person_value;

    #[test]
    fn harness_tracks_stores_and_removes() {
        let mut harness = IntegrationHarness::new();
        harness.apply(&IndexOperation::Store {
            key: Value::Integer(1),
            value: person_value("ann", 30, "Oslo"),
            version: 1,
        });
        harness.apply(&IndexOperation::Store {
            key: Value::Integer(2),
            value: person_value("bob", 40, "Lima"),
            version: 1,
        });
        harness.apply(&IndexOperation::Swap {
            key: Value::Integer(2),
        });
        harness.apply(&IndexOperation::Remove {
            key: Value::Integer(1),
        });
        harness.verify_all();
        assert_eq!(harness.live_keys(), vec![Value::Integer(2)]);
        assert_eq!(harness.tracked_count(), 2);
    }
}
