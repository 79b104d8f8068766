//! # Scheduler Benchmark
//!
//! Compares worker counts on a batch of independent moves, and measures the
//! analyzer alone on a batch with a conflict chain every fourth operation.
//!
//! Run with: `cargo bench --package megalith_scheduler`

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use megalith_core::{EntityId, Position, World};
use megalith_ops::{BatchBuilder, Operation};
use megalith_scheduler::{partition, CancelToken, Scheduler, SchedulerConfig};
use parking_lot::RwLock;

fn positioned(count: u32) -> (World, Vec<EntityId>) {
    let mut world = World::new();
    let ids = (0..count)
        .map(|i| {
            let id = world.create();
            world
                .attach(id, Position::new(f64::from(i), 0.0).into())
                .unwrap();
            id
        })
        .collect();
    (world, ids)
}

fn moves(world: &World, ids: &[EntityId], stride: usize) -> Vec<Operation> {
    let mut batch = BatchBuilder::new(world);
    for (i, &id) in ids.iter().enumerate() {
        let target = if stride > 0 && i % stride == 0 { ids[0] } else { id };
        batch.move_entity(target, Position::new(1.0, 2.0)).unwrap();
    }
    batch.build()
}

fn bench_workers(c: &mut Criterion) {
    let (world, ids) = positioned(2_000);
    let ops = moves(&world, &ids, 0);
    let mut group = c.benchmark_group("run_2k_independent");
    for threads in [1, 2, 4, 8] {
        let scheduler = Scheduler::new(SchedulerConfig {
            worker_threads: threads,
            max_batch_size: 4096,
        })
        .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, _| {
            b.iter(|| {
                let live = Arc::new(RwLock::new(world.clone()));
                let results = scheduler
                    .run(&live, ops.clone(), &CancelToken::new())
                    .unwrap();
                black_box(results.len())
            });
        });
    }
    group.finish();
}

fn bench_partition(c: &mut Criterion) {
    let (world, ids) = positioned(2_000);
    let ops = moves(&world, &ids, 4);
    c.bench_function("partition_2k_chain", |b| {
        b.iter(|| black_box(partition(&ops)).len());
    });
}

criterion_group!(benches, bench_workers, bench_partition);
criterion_main!(benches);
