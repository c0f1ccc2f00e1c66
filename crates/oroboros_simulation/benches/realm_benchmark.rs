//! Benchmarks for the realm core hot paths.
//!
//! TARGET: a 500-entity region ticks well inside one 20 ms step.
//!
//! Run with: cargo bench --package oroboros_simulation --bench realm_benchmark

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use oroboros_shared::{EntityId, EntityKind, OwnerId, SkillId, Vec3};
use oroboros_simulation::config::AoiConfig;
use oroboros_simulation::nav::GridCoord;
use oroboros_simulation::scheduler::TimerWheel;
use oroboros_simulation::{
    AgentSpec, Intent, NavVolume, Region, SimConfig, SpatialIndex, SpawnRequest, TickEvent, VoxelGrid,
};

fn scattered(i: u64) -> Vec3 {
    // Cheap deterministic spread over a 200 x 200 area.
    let x = ((i * 7919) % 200) as f32 - 100.0;
    let z = ((i * 104_729) % 200) as f32 - 100.0;
    Vec3::new(x, 0.5, z)
}

fn benchmark_aoi_update(c: &mut Criterion) {
    let mut index = SpatialIndex::new(AoiConfig::default());
    for i in 0..1_000u64 {
        index.add(EntityId(i), scattered(i));
    }

    let mut group = c.benchmark_group("aoi");
    group.throughput(Throughput::Elements(1_000));
    group.bench_function("update_1000_entities", |b| {
        let mut step = 0u64;
        b.iter(|| {
            step = step.wrapping_add(1);
            for i in 0..1_000u64 {
                let offset = Vec3::new((step % 3) as f32, 0.0, 0.0);
                black_box(index.update(EntityId(i), scattered(i) + offset));
            }
        });
    });
    group.bench_function("query_circle_r32", |b| {
        b.iter(|| black_box(index.query_circle(black_box(Vec3::ZERO), 32.0)));
    });
    group.finish();
}

fn benchmark_timer_wheel(c: &mut Criterion) {
    c.bench_function("wheel_step_10000_timers", |b| {
        b.iter_batched(
            || {
                let mut wheel = TimerWheel::new(512);
                for i in 0..10_000u64 {
                    wheel.register(format!("t{i}"), OwnerId(i % 16), i, 1 + i % 1_500, 0, false);
                }
                wheel
            },
            |mut wheel| {
                let mut fired = 0u64;
                for _ in 0..1_500 {
                    wheel.advance(|_, event| fired += event.message);
                }
                black_box(fired)
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

fn benchmark_region_tick(c: &mut Criterion) {
    let mut grid = VoxelGrid::new([220, 4, 220], Vec3::new(-110.0, -1.0, -110.0), 1.0);
    for x in 0..220 {
        for z in 0..220 {
            grid.set_walkable(GridCoord::new(x, 1, z), true);
        }
    }
    let nav = Arc::new(NavVolume::from_grid(grid));
    let mut region = Region::with_nav("bench", Arc::new(SimConfig::default()), Arc::clone(&nav));
    for i in 0..500u64 {
        let (kind, agent) = if i % 5 == 0 {
            (EntityKind::Player, None)
        } else {
            (
                EntityKind::Monster,
                Some(AgentSpec {
                    skill: SkillId(1),
                    home: None,
                }),
            )
        };
        let spawned = region.spawn(SpawnRequest {
            id: EntityId(i),
            kind,
            position: scattered(i),
            yaw: 0.0,
            agent,
        });
        assert!(spawned.is_ok());
    }

    let mut tick = 0u64;
    c.bench_function("region_tick_500_entities", |b| {
        b.iter(|| {
            tick += 1;
            let report = region.on_tick(&TickEvent {
                tick,
                utc_ms: 0,
                delta_time_seconds: 0.02,
            });
            for intent in &report.intents {
                if let Intent::Move {
                    entity,
                    target_yaw,
                    direction,
                    speed,
                    ..
                } = *intent
                {
                    if let Some(current) = region.entity(entity).map(|e| e.position) {
                        let next = nav.snap_height(current + direction * (speed * 0.02));
                        let _ = region.apply_movement(entity, next, target_yaw, direction);
                    }
                }
            }
            black_box(report.intents.len())
        });
    });
}

criterion_group!(benches, benchmark_aoi_update, benchmark_timer_wheel, benchmark_region_tick);
criterion_main!(benches);
