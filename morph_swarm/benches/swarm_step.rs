//! Per-frame cost of the swarm update.
//!
//! Run with: cargo bench --bench swarm_step

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use morph_shapes::{generate, Shape, PROCEDURAL_POINT_COUNT};
use morph_swarm::{GestureState, ParticleSystem, SimParams};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("swarm_step");
    let targets = generate(Shape::Bottle, PROCEDURAL_POINT_COUNT, &mut StdRng::seed_from_u64(1));

    for &count in &[1000usize, 4000, 16_000] {
        let mut sys = ParticleSystem::new(count, SimParams::default(), StdRng::seed_from_u64(2));
        sys.set_targets(targets.clone());
        let gesture = GestureState::from_openness(0.8);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| sys.step(black_box(&gesture), 1.0 / 60.0));
        });
    }
    group.finish();
}

fn bench_fill_flat(c: &mut Criterion) {
    let sys = ParticleSystem::new(4000, SimParams::default(), StdRng::seed_from_u64(3));
    let mut buf = Vec::new();
    c.bench_function("fill_flat_4000", |b| {
        b.iter(|| {
            sys.fill_flat(&mut buf);
            black_box(buf.len())
        })
    });
}

criterion_group!(benches, bench_step, bench_fill_flat);
criterion_main!(benches);
