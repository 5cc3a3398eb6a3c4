//! Commit-path benchmarks.
//!
//! Measures the cost of one frame at several population sizes: a walk over
//! the current generation that writes one property on every entity, moves a
//! tenth of them and replaces another tenth, followed by the commit that
//! promotes it all.
//!
//! Run with: `cargo bench --bench commit_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use strata_ecs::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn setup_world(entity_count: usize) -> World {
    let schema = ComponentSchema::builder()
        .component("health", [("hp", Value::from(100))])
        .component("position", [("x", Value::from(0.0)), ("y", Value::from(0.0))])
        .build()
        .expect("benchmark schema is valid");
    let config = WorldConfig {
        entity_capacity: entity_count,
        ..WorldConfig::default()
    };
    let mut world = World::with_config(schema, config);
    for _ in 0..entity_count {
        let e = world.create_entity("alive");
        world
            .entity_mut(e)
            .and_then(|mut m| m.add(["health", "position"]))
            .expect("fresh entity accepts components");
    }
    world.apply_changes().expect("initial commit");
    world
}

fn run_frame(world: &mut World, tick: i64) {
    let mut visited = 0usize;
    world.for_each_entity_mut(|entity, stage| {
        let id = entity.id();
        visited += 1;
        if let Ok(mut staged) = stage.entity_mut(id) {
            let _ = staged.set("health", "hp", tick);
        }
        match visited % 10 {
            0 => {
                let _ = stage.move_entity(id, if tick % 2 == 0 { "alive" } else { "resting" });
            }
            5 => {
                let _ = stage.destroy_entity(id);
                let e = stage.create_entity("alive");
                if let Ok(mut spawned) = stage.entity_mut(e) {
                    let _ = spawned.add(["health", "position"]);
                }
            }
            _ => {}
        }
    });
    black_box(world.apply_changes().expect("frame commit"));
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");
    for &count in &[1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut world = setup_world(count);
            let mut tick = 0i64;
            b.iter(|| {
                tick += 1;
                run_frame(&mut world, tick);
            });
        });
    }
    group.finish();
}

fn bench_idle_commit(c: &mut Criterion) {
    let mut world = setup_world(10_000);
    c.bench_function("idle_commit_10k", |b| {
        b.iter(|| black_box(world.apply_changes().expect("idle commit")));
    });
}

criterion_group!(benches, bench_frame, bench_idle_commit);
criterion_main!(benches);
