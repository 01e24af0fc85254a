//! Test fixtures and engine helpers.
//!
//! Provides a started engine wired to an in-memory cache and a manual
//! clock, plus the descriptors most tests share.

use gridix_core::{
    Clock, Component, CoreResult, FieldDescriptor, FieldType, GridContext, IndexingConfig,
    IndexingEngine, ManualClock, MemoryCache, SpaceName, TypeDescriptor, Value, Version,
    NEVER_EXPIRES,
};
use std::sync::Arc;

/// Clock reading the fixtures start at.
pub const START_MILLIS: u64 = 1_000_000;

/// A started engine with its cache and clock.
///
/// Values written through [`TestGrid::put`] land in both the cache and the
/// index, the way a cache node feeds its indexing component.
pub struct TestGrid {
    /// The engine under test.
    pub engine: Arc<IndexingEngine>,
    /// The runtime context the engine runs in.
    pub context: Arc<GridContext>,
    /// The authoritative cache.
    pub cache: Arc<MemoryCache>,
    /// The clock shared by context and tests.
    pub clock: Arc<ManualClock>,
}

impl TestGrid {
    /// Creates a started grid with the default configuration.
    pub fn new() -> Self {
        Self::with_config(IndexingConfig::default())
    }

    /// Creates a started grid with a custom configuration.
    pub fn with_config(config: IndexingConfig) -> Self {
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        let context = Arc::new(
            GridContext::new("testkit").with_clock(Arc::clone(&clock) as Arc<dyn Clock>),
        );
        let cache = Arc::new(MemoryCache::new());
        context
            .components()
            .add(Arc::clone(&cache) as Arc<dyn Component>)
            .expect("Failed to register cache component");

        let engine = Arc::new(IndexingEngine::new(config));
        engine
            .start(Arc::clone(&context))
            .expect("Failed to start indexing engine");

        Self {
            engine,
            context,
            cache,
            clock,
        }
    }

    /// Registers a type, panicking if it is rejected.
    pub fn register(&self, space: &SpaceName, descriptor: &TypeDescriptor) {
        let accepted = self
            .engine
            .register_type(space, descriptor.clone())
            .expect("Failed to register type");
        assert!(accepted, "type {} was rejected", descriptor.name);
    }

    /// Writes a value to the cache and indexes it.
    pub fn put(
        &self,
        space: &SpaceName,
        descriptor: &TypeDescriptor,
        key: impl Into<Value>,
        value: Value,
        version: u64,
    ) -> CoreResult<bool> {
        self.put_expiring(space, descriptor, key, value, version, NEVER_EXPIRES)
    }

    /// Like [`put`](Self::put), with an expiration time.
    pub fn put_expiring(
        &self,
        space: &SpaceName,
        descriptor: &TypeDescriptor,
        key: impl Into<Value>,
        value: Value,
        version: u64,
        expiration_time: u64,
    ) -> CoreResult<bool> {
        let key = key.into();
        let version = Version::from_u64(version);
        let stored = self.engine.store(
            space,
            descriptor,
            key.clone(),
            value.clone(),
            version.clone(),
            expiration_time,
        )?;
        if stored {
            self.cache
                .put_expiring(space, &descriptor.name, key, value, version, expiration_time);
        }
        Ok(stored)
    }

    /// Removes a key from the cache and the index.
    pub fn delete(&self, space: &SpaceName, key: impl Into<Value>) -> CoreResult<bool> {
        let key = key.into();
        self.cache.remove(space, &key);
        self.engine.remove(space, &key)
    }

    /// Runs a field query and collects its rows.
    pub fn select(&self, space: &SpaceName, text: &str, params: &[Value]) -> Vec<Vec<Value>> {
        self.engine
            .query_fields(space, text, params, None)
            .expect("Failed to run field query")
            .collect::<CoreResult<_>>()
            .expect("Field query failed mid-stream")
    }

    /// Runs a row query and collects its keys.
    pub fn keys(
        &self,
        space: &SpaceName,
        descriptor: &TypeDescriptor,
        clause: &str,
        params: &[Value],
    ) -> Vec<Value> {
        self.engine
            .query(space, clause, params, descriptor, None)
            .expect("Failed to run row query")
            .map(|row| row.map(|(key, _)| key))
            .collect::<CoreResult<_>>()
            .expect("Row query failed mid-stream")
    }

    /// Runs a text query and collects its keys, best match first.
    pub fn search(&self, space: &SpaceName, descriptor: &TypeDescriptor, text: &str) -> Vec<Value> {
        self.engine
            .query_text(space, text, descriptor, None)
            .expect("Failed to run text query")
            .map(|row| row.map(|(key, _)| key))
            .collect::<CoreResult<_>>()
            .expect("Text query failed mid-stream")
    }

    /// Returns the live size of a type.
    pub fn size(&self, space: &SpaceName, descriptor: &TypeDescriptor) -> i64 {
        self.engine
            .size(space, descriptor, None)
            .expect("Failed to size type")
    }
}

impl Default for TestGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestGrid {
    fn drop(&mut self) {
        // The context holds the engine as a component; stopping breaks the cycle.
        self.engine.stop();
    }
}

/// Runs a test with a started grid.
///
/// # Example
///
/// ```rust
/// use gridix_testkit::{person, person_value, with_grid};
/// use gridix_core::SpaceName;
///
/// with_grid(|grid| {
///     grid.register(&SpaceName::DEFAULT, &person());
///     grid.put(&SpaceName::DEFAULT, &person(), 1, person_value("ann", 30, "Oslo"), 1).unwrap();
///     assert_eq!(grid.size(&SpaceName::DEFAULT, &person()), 1);
/// });
/// ```
pub fn with_grid<F, R>(f: F) -> R
where
    F: FnOnce(&TestGrid) -> R,
{
    let grid = TestGrid::new();
    f(&grid)
}

/// `Person { name: Text, age: Integer, city: Text, bio: Text }`.
///
/// `name` and `age` are indexed; `name` and `bio` feed the text index.
pub fn person() -> TypeDescriptor {
    TypeDescriptor::new("Person")
        .field(FieldDescriptor::new("name", FieldType::Text).indexed())
        .field(FieldDescriptor::new("age", FieldType::Integer).indexed())
        .field(FieldDescriptor::new("city", FieldType::Text).at_path(&["address", "city"]))
        .field(FieldDescriptor::new("bio", FieldType::Text))
        .text_field("name")
        .text_field("bio")
}

/// `Purchase { customer: Integer, total: Integer }` with no text index.
pub fn purchase() -> TypeDescriptor {
    TypeDescriptor::new("Purchase")
        .field(FieldDescriptor::new("customer", FieldType::Integer).indexed())
        .field(FieldDescriptor::new("total", FieldType::Integer))
}

/// Builds a `Person` value.
pub fn person_value(name: &str, age: i64, city: &str) -> Value {
    Value::object([
        ("name", Value::from(name)),
        ("age", Value::Integer(age)),
        ("address", Value::object([("city", city)])),
    ])
}

/// Builds a `Person` value with a biography.
pub fn person_with_bio(name: &str, age: i64, city: &str, bio: &str) -> Value {
    Value::object([
        ("name", Value::from(name)),
        ("age", Value::Integer(age)),
        ("address", Value::object([("city", city)])),
        ("bio", Value::from(bio)),
    ])
}

/// Builds a `Purchase` value.
pub fn purchase_value(customer: i64, total: i64) -> Value {
    Value::object([("customer", customer), ("total", total)])
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    const CITIES: [&str; 4] = ["Oslo", "Lima", "Pune", "Kyiv"];

    /// Creates a grid holding `count` people in the default space.
    ///
    /// Person `i` has key `i`, name `person-i`, age `20 + i % 50` and a city
    /// picked round-robin.
    pub fn populated_grid(count: usize) -> TestGrid {
        let grid = TestGrid::new();
        let space = SpaceName::DEFAULT;
        grid.register(&space, &person());
        for i in 0..count {
            let i = i as i64;
            let value = person_value(
                &format!("person-{i}"),
                20 + i % 50,
                CITIES[(i % 4) as usize],
            );
            grid.put(&space, &person(), i, value, 1)
                .expect("Failed to index person");
        }
        grid
    }

    /// Loads a JSON array of `{"key": .., "value": .., "version": ..}`
    /// objects into a registered type.
    pub fn load_json(
        grid: &TestGrid,
        space: &SpaceName,
        descriptor: &TypeDescriptor,
        json: &serde_json::Value,
    ) -> CoreResult<usize> {
        let mut loaded = 0;
        for record in json.as_array().into_iter().flatten() {
            let key = gridix_codec::from_json(&record["key"])?;
            let value = gridix_codec::from_json(&record["value"])?;
            let version = record["version"].as_u64().unwrap_or(1);
            if grid.put(space, descriptor, key, value, version)? {
                loaded += 1;
            }
        }
        Ok(loaded)
    }
}
