//! Benchmarks for the event-processing core.
//!
//! Benchmarks cover:
//! - Object pool acquire/release cycles
//! - Queue enqueue and priority-ordered batch draining
//! - Memoization cache lookups under eviction pressure
//! - End-to-end scheduling scenarios

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use percept_scheduler::builders::SchedulerBuilder;
use percept_scheduler::config::{ExhaustionPolicy, SchedulerConfig};
use percept_scheduler::core::{
    BatchCompute, MemoizationCache, ObjectPool, PriorityEventQueue,
};
use percept_scheduler::runtime::Spawn;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::runtime::Runtime;

// ============================================================================
// Test Payload and Computation
// ============================================================================

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct BenchPayload {
    id: u64,
    data: String,
}

fn payload(id: u64) -> BenchPayload {
    BenchPayload {
        id,
        data: format!("payload-data-{id}"),
    }
}

#[derive(Clone)]
struct SumCompute;

#[async_trait]
impl BatchCompute<BenchPayload, u64> for SumCompute {
    async fn compute(&self, batch: Vec<BenchPayload>) -> Result<u64, String> {
        Ok(batch.iter().map(|p| p.id).sum())
    }
}

#[derive(Clone)]
struct TokioSpawnAdapter;

impl Spawn for TokioSpawnAdapter {
    fn spawn<F>(&self, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(fut);
    }
}

// ============================================================================
// Object Pool Benchmarks
// ============================================================================

fn bench_pool_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_acquire_release");

    for size in [64, 512, 4096] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let pool: ObjectPool<BenchPayload> = ObjectPool::new(
                size as usize,
                size as usize,
                ExhaustionPolicy::Reject,
            );
            b.iter(|| {
                let mut records = Vec::with_capacity(size as usize);
                for _ in 0..size {
                    records.push(pool.acquire().unwrap());
                }
                for record in records {
                    pool.release(record);
                }
            });
        });
    }
    group.finish();
}

// ============================================================================
// Queue Benchmarks
// ============================================================================

fn bench_queue_enqueue_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_enqueue_drain");

    for size in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let pool = Arc::new(ObjectPool::new(
                    size as usize,
                    size as usize,
                    ExhaustionPolicy::Reject,
                ));
                let q = PriorityEventQueue::new(pool);
                for i in 0..size {
                    q.enqueue(payload(i), (i % 4) as u8).unwrap();
                }
                loop {
                    let batch = q.drain_batch(64, Duration::from_millis(5));
                    if batch.is_empty() {
                        break;
                    }
                    for record in batch {
                        q.release(black_box(record));
                    }
                }
            });
        });
    }
    group.finish();
}

fn bench_queue_mixed_priorities(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_mixed_priorities");

    for size in [1_000, 5_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(42);
                let pool = Arc::new(ObjectPool::new(
                    size as usize,
                    size as usize,
                    ExhaustionPolicy::Reject,
                ));
                let q = PriorityEventQueue::new(pool);
                for i in 0..size {
                    q.enqueue(payload(i), rng.random_range(0..=255)).unwrap();
                }
                let mut drained = 0;
                loop {
                    let batch = q.drain_batch(32, Duration::from_millis(5));
                    if batch.is_empty() {
                        break;
                    }
                    drained += batch.len();
                    for record in batch {
                        q.release(record);
                    }
                }
                black_box(drained);
            });
        });
    }
    group.finish();
}

// ============================================================================
// Memoization Cache Benchmarks
// ============================================================================

fn bench_cache_hit_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_hit_path");

    for capacity in [128, 1_024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                let cache: MemoizationCache<u64> = MemoizationCache::new(capacity);
                for i in 0..capacity as u64 {
                    cache.insert(format!("key-{i}"), i);
                }
                b.iter(|| {
                    for i in 0..capacity as u64 {
                        black_box(cache.lookup(&format!("key-{i}")));
                    }
                });
            },
        );
    }
    group.finish();
}

fn bench_cache_eviction_pressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_eviction_pressure");

    group.bench_function("insert_past_capacity", |b| {
        b.iter(|| {
            let cache: MemoizationCache<u64> = MemoizationCache::new(128);
            for i in 0..1_000u64 {
                cache.insert(format!("key-{i}"), i);
            }
            black_box(cache.len());
        });
    });
    group.finish();
}

// ============================================================================
// End-to-End Scenario Benchmarks
// ============================================================================

fn bench_end_to_end_scenario(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end_scenario");
    group.sample_size(20);

    group.bench_function("submit_tick_drain", |b| {
        b.to_async(Runtime::new().unwrap()).iter(|| async {
            let config = SchedulerConfig::new()
                .with_tick_interval_ms(60_000)
                .with_worker_count(2)
                .with_max_batch_size(32)
                .with_pool_sizes(256, 256);
            let scheduler = SchedulerBuilder::new(SumCompute, TokioSpawnAdapter)
                .with_config(config)
                .build::<BenchPayload, u64>()
                .unwrap();

            let mut rng = StdRng::seed_from_u64(7);
            for i in 0..200u64 {
                scheduler
                    .submit_event(payload(i), rng.random_range(0..4))
                    .unwrap();
            }

            while scheduler.queue_depth() > 0 {
                scheduler.tick();
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            scheduler.shutdown();
        });
    });
    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(pool_benches, bench_pool_acquire_release);

criterion_group!(
    queue_benches,
    bench_queue_enqueue_drain,
    bench_queue_mixed_priorities
);

criterion_group!(
    cache_benches,
    bench_cache_hit_path,
    bench_cache_eviction_pressure
);

criterion_group!(scenario_benches, bench_end_to_end_scenario);

criterion_main!(pool_benches, queue_benches, cache_benches, scenario_benches);
