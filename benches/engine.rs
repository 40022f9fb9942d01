use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use bitempo::{
    Attributes, BitemporalEngine, GetBuilder, InMemoryVersionStore, PutBuilder, TimeRange,
    TxRange, Value,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

const SEEDED_VERSIONS: i64 = 1024;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}

fn make_engine_with_data() -> BitemporalEngine {
    let engine = BitemporalEngine::new(Arc::new(InMemoryVersionStore::new()));

    // One entity with a dense correction history: every version covers a
    // month of valid time and is recorded an hour after the previous one.
    for i in 0..SEEDED_VERSIONS {
        let from = base() + Duration::days(i % 365);
        engine
            .put(
                "bench-entity",
                Attributes::new().with("n", Value::Int(i)).unwrap(),
                TimeRange::new(from, from + Duration::days(30)).unwrap(),
                Some(base() + Duration::hours(i)),
            )
            .unwrap();
    }
    engine
}

fn bench_get(c: &mut Criterion) {
    let engine = make_engine_with_data();
    let valid_at = base() + Duration::days(100);
    let as_of = base() + Duration::hours(SEEDED_VERSIONS);

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));
    group.bench_function("as_of_latest", |b| {
        b.iter(|| {
            engine
                .get("bench-entity", Some(black_box(valid_at)), Some(black_box(as_of)))
                .unwrap()
        });
    });
    group.bench_function("as_of_midpoint", |b| {
        let request = GetBuilder::new("bench-entity")
            .valid_at(valid_at)
            .as_of(base() + Duration::hours(SEEDED_VERSIONS / 2))
            .build()
            .unwrap();
        b.iter(|| request.execute(&engine).unwrap());
    });
    group.finish();
}

fn bench_history(c: &mut Criterion) {
    let engine = make_engine_with_data();

    let mut group = c.benchmark_group("history");
    group.bench_function("all_capped", |b| {
        b.iter(|| engine.history("bench-entity", black_box(TxRange::all())).unwrap());
    });
    group.bench_function("narrow_window", |b| {
        let window = TxRange::new(base() + Duration::hours(500), base() + Duration::hours(520))
            .unwrap();
        b.iter(|| engine.history("bench-entity", black_box(window)).unwrap());
    });
    group.finish();
}

fn bench_put(c: &mut Criterion) {
    let engine = BitemporalEngine::new(Arc::new(InMemoryVersionStore::new()));
    let mut n = 0i64;

    let mut group = c.benchmark_group("put");
    group.throughput(Throughput::Elements(1));
    group.bench_function("append", |b| {
        b.iter(|| {
            n += 1;
            PutBuilder::new("bench-entity")
                .attribute("n", n)
                .valid_from(base())
                .known_at(base() + Duration::microseconds(n))
                .build()
                .unwrap()
                .execute(&engine)
                .unwrap()
        });
    });
    group.finish();
}

criterion_group!(benches, bench_get, bench_history, bench_put);
criterion_main!(benches);
