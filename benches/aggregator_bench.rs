//! Benchmark for critical-path aggregation performance

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use txpipe::aggregator::Aggregator;

fn bench_aggregate_10k(c: &mut Criterion) {
    let aggregator = Aggregator::default();
    let samples: Vec<u64> = (0..10_000).map(|_| fastrand::u64(..2_000)).collect();

    c.bench_function("aggregate_10k", |b| {
        b.iter(|| black_box(aggregator.aggregate(black_box(&samples))));
    });
}

fn bench_aggregate_all_filtered(c: &mut Criterion) {
    let aggregator = Aggregator::default();
    let samples: Vec<u64> = vec![500; 10_000];

    c.bench_function("aggregate_all_filtered", |b| {
        b.iter(|| black_box(aggregator.aggregate(black_box(&samples))));
    });
}

fn bench_fingerprint_10k(c: &mut Criterion) {
    let aggregator = Aggregator::default();
    let samples: Vec<u64> = (0..10_000).map(|_| fastrand::u64(..2_000)).collect();

    c.bench_function("fingerprint_10k", |b| {
        b.iter(|| black_box(aggregator.fingerprint(black_box(&samples))));
    });
}

criterion_group!(
    benches,
    bench_aggregate_10k,
    bench_aggregate_all_filtered,
    bench_fingerprint_10k
);
criterion_main!(benches);
