use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use issuehive::application::{ItemProcessor, PoolConfig, WorkQueue, WorkerPool};
use issuehive::domain::models::WorkItemId;

fn ids(count: usize) -> Vec<WorkItemId> {
    (0..count)
        .map(|n| WorkItemId::new(format!("https://github.com/acme/widgets/issues/{n}")))
        .collect()
}

fn bench_enqueue_dequeue(c: &mut Criterion) {
    let mut group = c.benchmark_group("work_queue");
    for size in [100usize, 1_000, 10_000] {
        let items = ids(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("enqueue_settle", size), &items, |b, items| {
            b.iter(|| {
                let queue = WorkQueue::new();
                for id in items {
                    queue.enqueue(id.clone());
                }
                // Rediscovery of every item is deduplicated.
                for id in items {
                    black_box(queue.enqueue(id.clone()));
                }
                while let Some(id) = queue.dequeue() {
                    queue.mark_completed(&id);
                }
                black_box(queue.stats())
            });
        });
    }
    group.finish();
}

struct Noop;

#[async_trait]
impl ItemProcessor for Noop {
    async fn process(&self, _item: &WorkItemId, _attempt: u32, _total: u32) -> anyhow::Result<()> {
        Ok(())
    }
}

fn bench_pool_drain(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let items = ids(1_000);
    let mut group = c.benchmark_group("worker_pool");
    group.throughput(Throughput::Elements(items.len() as u64));
    for workers in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::new("drain", workers), &workers, |b, &workers| {
            b.to_async(&runtime).iter(|| async {
                let pool = WorkerPool::new(
                    Arc::new(WorkQueue::new()),
                    Arc::new(Noop),
                    PoolConfig {
                        workers,
                        attempts_per_item: 1,
                        attempt_spacing: Duration::ZERO,
                    },
                );
                for id in &items {
                    pool.queue().enqueue(id.clone());
                }
                pool.start().await;
                pool.queue().wait_drained().await;
                black_box(pool.shutdown(Duration::from_secs(1)).await)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_enqueue_dequeue, bench_pool_drain);
criterion_main!(benches);
