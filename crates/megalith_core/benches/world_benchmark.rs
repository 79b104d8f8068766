//! # World Benchmark
//!
//! Measures the registry operations every committed batch touches:
//! creation, component attach, ordered queries and digest recomputation.
//!
//! Run with: `cargo bench --package megalith_core`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use megalith_core::{ComponentKind, Digest, Encode, Position, Tool, World};

fn populated_world(count: usize) -> World {
    let mut world = World::new();
    for i in 0..count {
        let id = world.create();
        #[allow(clippy::cast_precision_loss)]
        let f = i as f64;
        world
            .attach(id, Position::new(f, f * 0.5).into())
            .unwrap();
        if i % 4 == 0 {
            world.attach(id, Tool::new("tool").into()).unwrap();
        }
    }
    world
}

fn bench_create_attach(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_attach");
    for count in [1_000, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| black_box(populated_world(count)).alive_count());
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let world = populated_world(100_000);
    c.bench_function("query_tool_position_100k", |b| {
        b.iter(|| {
            world
                .query(&[ComponentKind::Tool, ComponentKind::Position])
                .count()
        });
    });
}

fn bench_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_digest");
    for count in [1_000, 10_000, 100_000] {
        let world = populated_world(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &world, |b, world| {
            // `World::digest` caches, so hash the encoding directly.
            b.iter(|| black_box(Digest::of(&world.to_canonical_bytes())));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_create_attach, bench_query, bench_digest);
criterion_main!(benches);
