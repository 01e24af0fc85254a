//! Benchmark utilities.

use gridix_core::{
    Component, FieldDescriptor, FieldType, GridContext, IndexingConfig, IndexingEngine,
    MemoryCache, SpaceName, TypeDescriptor, Value, Version, NEVER_EXPIRES,
};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

const WORDS: [&str; 12] = [
    "grid", "cache", "index", "query", "swap", "node", "space", "version", "token", "range",
    "scan", "merge",
];

const CITIES: [&str; 6] = ["Oslo", "Lima", "Pune", "Kyiv", "Quito", "Hanoi"];

/// The descriptor every benchmark indexes.
pub fn bench_type() -> TypeDescriptor {
    TypeDescriptor::new("Person")
        .field(FieldDescriptor::new("name", FieldType::Text).indexed())
        .field(FieldDescriptor::new("age", FieldType::Integer).indexed())
        .field(FieldDescriptor::new("city", FieldType::Text).at_path(&["address", "city"]))
        .field(FieldDescriptor::new("bio", FieldType::Text))
        .text_field("bio")
}

/// Generate a random person value with a bio of `words` words.
pub fn random_person(rng: &mut impl Rng, words: usize) -> Value {
    let bio: Vec<&str> = (0..words)
        .filter_map(|_| WORDS.choose(rng).copied())
        .collect();
    let city = CITIES.choose(rng).copied().unwrap_or("Oslo");
    Value::object([
        ("name", Value::Text(format!("person-{}", rng.gen::<u32>()))),
        ("age", Value::Integer(rng.gen_range(18..90))),
        ("address", Value::object([("city", city)])),
        ("bio", Value::Text(bio.join(" "))),
    ])
}

/// Starts an engine with [`bench_type`] registered in the default space.
pub fn started_engine(config: IndexingConfig) -> Arc<IndexingEngine> {
    let context = Arc::new(GridContext::new("bench"));
    context
        .components()
        .add(Arc::new(MemoryCache::new()) as Arc<dyn Component>)
        .expect("Failed to register cache");
    let engine = Arc::new(IndexingEngine::new(config));
    engine.start(context).expect("Failed to start engine");
    engine
        .register_type(&SpaceName::DEFAULT, bench_type())
        .expect("Failed to register type");
    engine
}

/// Starts an engine and indexes `count` random people under keys `0..count`.
pub fn populated_engine(count: usize) -> Arc<IndexingEngine> {
    let engine = started_engine(IndexingConfig::default());
    let descriptor = bench_type();
    let mut rng = rand::thread_rng();
    for key in 0..count {
        engine
            .store(
                &SpaceName::DEFAULT,
                &descriptor,
                Value::Integer(key as i64),
                random_person(&mut rng, 8),
                Version::from_u64(1),
                NEVER_EXPIRES,
            )
            .expect("Failed to store");
    }
    engine
}
