//! Value codec benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gridix_bench::random_person;
use gridix_codec::{from_cbor, from_json, to_cbor, Value};

/// Create a nested value `depth` levels deep with `width` fields per level.
fn nested_value(depth: usize, width: usize) -> Value {
    if depth == 0 {
        Value::Text("leaf".into())
    } else {
        Value::object((0..width).map(|i| (format!("key_{i}"), nested_value(depth - 1, width))))
    }
}

/// Benchmark the CBOR form swapped values travel in.
fn bench_cbor(c: &mut Criterion) {
    let mut group = c.benchmark_group("cbor");
    let person = random_person(&mut rand::thread_rng(), 16);
    let bytes = to_cbor(&person).unwrap();
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("encode_person", |b| {
        b.iter(|| black_box(to_cbor(black_box(&person)).unwrap()));
    });
    group.bench_function("decode_person", |b| {
        b.iter(|| black_box(from_cbor(black_box(&bytes)).unwrap()));
    });
    group.finish();
}

/// Benchmark field extraction along nested paths.
fn bench_get_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_path");

    for depth in [1usize, 3, 5].iter() {
        let value = nested_value(*depth, 8);
        let path: Vec<String> = (0..*depth).map(|_| "key_7".to_string()).collect();
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, _| {
            b.iter(|| black_box(value.get_path(black_box(path.as_slice()))));
        });
    }
    group.finish();
}

/// Benchmark JSON dataset conversion.
fn bench_from_json(c: &mut Criterion) {
    let json = serde_json::json!({
        "name": "Alice",
        "age": 30,
        "address": { "city": "Oslo", "zip": "0150" },
        "tags": ["a", "b", "c"],
    });
    c.bench_function("from_json_person", |b| {
        b.iter(|| black_box(from_json(black_box(&json)).unwrap()));
    });
}

criterion_group!(benches, bench_cbor, bench_get_path, bench_from_json);
criterion_main!(benches);
