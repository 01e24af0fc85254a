//! Index maintenance and query benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gridix_bench::{bench_type, populated_engine, random_person, started_engine};
use gridix_core::{IndexingConfig, SpaceName, Value, Version, NEVER_EXPIRES};

/// Benchmark stores of fresh keys.
fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Elements(1));

    group.bench_function("fresh_key", |b| {
        let engine = started_engine(IndexingConfig::default());
        let descriptor = bench_type();
        let mut rng = rand::thread_rng();
        let mut key = 0i64;
        b.iter(|| {
            key += 1;
            let stored = engine
                .store(
                    &SpaceName::DEFAULT,
                    &descriptor,
                    Value::Integer(key),
                    random_person(&mut rng, 8),
                    Version::from_u64(1),
                    NEVER_EXPIRES,
                )
                .unwrap();
            black_box(stored);
        });
    });

    group.bench_function("update_same_key", |b| {
        let engine = started_engine(IndexingConfig::default());
        let descriptor = bench_type();
        let mut rng = rand::thread_rng();
        let mut version = 0u64;
        b.iter(|| {
            version += 1;
            engine
                .store(
                    &SpaceName::DEFAULT,
                    &descriptor,
                    Value::Integer(1),
                    random_person(&mut rng, 8),
                    Version::from_u64(version),
                    NEVER_EXPIRES,
                )
                .unwrap();
        });
    });

    group.finish();
}

/// Benchmark range and equality queries over indexed fields.
fn bench_field_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_query");

    for count in [1_000usize, 10_000].iter() {
        let engine = populated_engine(*count);

        group.bench_with_input(BenchmarkId::new("age_range", count), count, |b, _| {
            let params = [Value::Integer(30), Value::Integer(35)];
            b.iter(|| {
                let cursor = engine
                    .query_fields(
                        &SpaceName::DEFAULT,
                        "SELECT _key FROM Person WHERE age BETWEEN ? AND ?",
                        &params,
                        None,
                    )
                    .unwrap();
                black_box(cursor.count());
            });
        });

        group.bench_with_input(BenchmarkId::new("key_lookup", count), count, |b, _| {
            let params = [Value::Integer(7)];
            b.iter(|| {
                let cursor = engine
                    .query_fields(
                        &SpaceName::DEFAULT,
                        "SELECT age FROM Person WHERE _key = ?",
                        &params,
                        None,
                    )
                    .unwrap();
                black_box(cursor.count());
            });
        });

        group.bench_with_input(BenchmarkId::new("unindexed_filter", count), count, |b, _| {
            let params = [Value::from("Lima")];
            b.iter(|| {
                let cursor = engine
                    .query(
                        &SpaceName::DEFAULT,
                        "city = ? LIMIT 50",
                        &params,
                        &bench_type(),
                        None,
                    )
                    .unwrap();
                black_box(cursor.count());
            });
        });
    }

    group.finish();
}

/// Benchmark text searches.
fn bench_text_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_query");
    let engine = populated_engine(5_000);
    let descriptor = bench_type();

    for search in ["grid", "grid cache swap", "ver*"].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(search), search, |b, search| {
            b.iter(|| {
                let cursor = engine
                    .query_text(&SpaceName::DEFAULT, search, &descriptor, None)
                    .unwrap();
                black_box(cursor.count());
            });
        });
    }

    group.finish();
}

/// Benchmark counting live entries.
fn bench_size(c: &mut Criterion) {
    let engine = populated_engine(10_000);
    let descriptor = bench_type();
    c.bench_function("size_10000", |b| {
        b.iter(|| {
            black_box(engine.size(&SpaceName::DEFAULT, &descriptor, None).unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_store,
    bench_field_query,
    bench_text_query,
    bench_size
);
criterion_main!(benches);
