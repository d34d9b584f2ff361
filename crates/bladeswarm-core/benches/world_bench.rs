use bladeswarm_core::{BladeswarmConfig, SpatialIndexKind, Vec2, World};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::time::Duration;

const STEPS: u32 = 32;

fn build_world(agents: usize, spatial_index: SpatialIndexKind) -> World {
    let config = BladeswarmConfig {
        rng_seed: Some(0x5EED),
        spatial_index,
        initial_hazards: 8,
        spawn_interval_ms: 0.0,
        ..BladeswarmConfig::default()
    };
    let mut world = World::new(config).expect("bench world");
    for agent in 0..agents {
        let x = (agent * 37 % 2_400) as f32;
        let y = (agent * 91 % 1_350) as f32;
        world.spawn_agent(Vec2::new(x, y));
    }
    world.update_cursor_target(1_200.0, 675.0);
    world
}

fn bench_world_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_update");
    group.sample_size(20);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(5));

    for &agents in &[32usize, 128, 512] {
        group.bench_function(format!("exhaustive_{agents}_agents_{STEPS}_steps"), |b| {
            b.iter_batched(
                || build_world(agents, SpatialIndexKind::Exhaustive),
                |mut world| {
                    for _ in 0..STEPS {
                        world.update();
                    }
                },
                BatchSize::LargeInput,
            );
        });
        group.bench_function(format!("grid_{agents}_agents_{STEPS}_steps"), |b| {
            b.iter_batched(
                || build_world(agents, SpatialIndexKind::UniformGrid { cell_size: 50.0 }),
                |mut world| {
                    for _ in 0..STEPS {
                        world.update();
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_world_update);
criterion_main!(benches);
