//! Benchmarks for the sliding-window strategy.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;
use tokio::runtime::Runtime;

use gatelimit::store::MemoryStore;
use gatelimit::SlidingWindow;

fn bench_strategy(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let window = Duration::from_secs(1);
    let penalty = Duration::from_secs(300);

    let mut group = c.benchmark_group("strategy");

    group.bench_function("admit", |b| {
        let store = MemoryStore::new();
        let strategy = SlidingWindow::new();
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let key = format!("ip:10.0.0.{}", i % 100);
            rt.block_on(async {
                black_box(
                    strategy
                        .evaluate(&store, &key, 1_000_000, window, penalty)
                        .await,
                )
            })
        })
    });

    group.bench_function("deny_penalized", |b| {
        let store = MemoryStore::new();
        let strategy = SlidingWindow::new();
        rt.block_on(async {
            // Trip the penalty so every iteration hits the fence.
            strategy
                .evaluate(&store, "ip:blocked", 1, window, Duration::from_secs(3600))
                .await
                .unwrap();
            strategy
                .evaluate(&store, "ip:blocked", 1, window, Duration::from_secs(3600))
                .await
                .unwrap();
        });
        b.iter(|| {
            rt.block_on(async {
                black_box(
                    strategy
                        .evaluate(&store, "ip:blocked", 1, window, Duration::from_secs(3600))
                        .await,
                )
            })
        })
    });

    group.bench_function("reset", |b| {
        let store = MemoryStore::new();
        let strategy = SlidingWindow::new();
        b.iter(|| {
            rt.block_on(async { black_box(strategy.reset(&store, "ip:10.0.0.1").await) })
        })
    });

    group.finish();
}

criterion_group!(benches, bench_strategy);
criterion_main!(benches);
