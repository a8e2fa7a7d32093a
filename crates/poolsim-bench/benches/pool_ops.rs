//! Criterion micro-benchmarks for pool resizing and assignment.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use poolsim_core::{PoolId, Timestamp};
use poolsim_engine::{PoolConfig, WorkerPool};
use poolsim_test_utils::{request, ScriptedDurations};
use std::hint::black_box;

fn pool(min: usize, max: usize) -> WorkerPool {
    let config = PoolConfig {
        min_workers: min,
        max_workers: max,
        startup_ms: 0,
        ..PoolConfig::default()
    };
    let mut pool = WorkerPool::new(PoolId(0), &config, Timestamp::ZERO).unwrap();
    pool.finish_startups(Timestamp::ZERO);
    pool
}

fn bench_resize(c: &mut Criterion) {
    let mut p = pool(1, 256);
    c.bench_function("resize_1_to_256_and_back", |b| {
        b.iter(|| {
            p.set_max_workers(256);
            p.set_min_workers(256, Timestamp::ZERO);
            p.finish_startups(Timestamp::ZERO);
            p.set_min_workers(1, Timestamp::ZERO);
            black_box(p.set_max_workers(1));
        });
    });
}

fn bench_assign_scan(c: &mut Criterion) {
    c.bench_function("assign_to_last_of_128", |b| {
        b.iter_batched(
            || {
                let mut p = pool(128, 128);
                let mut durations = ScriptedDurations::new([]).with_fallback(u64::MAX);
                // Occupy all but the last worker.
                for id in 0..127 {
                    let _ = p.assign_worker(request(id), Timestamp::ZERO, &mut durations, None);
                }
                (p, durations)
            },
            |(mut p, mut durations)| {
                black_box(p.assign_worker(request(999), Timestamp::ZERO, &mut durations, None))
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_resize, bench_assign_scan);
criterion_main!(benches);
