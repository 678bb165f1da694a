//! Benchmarks for the breathing oscillator.

use std::hint::black_box;

use biosyn_dsp::dsp::breath::{BreathShape, Trajectory, TrajectoryPoint};
use biosyn_dsp::graph::{BreathingOscillator, GraphNode, RenderCtx};
use criterion::{BenchmarkId, Criterion};

use crate::BLOCK_SIZES;

pub fn bench_breathing(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/breathing");
    let ctx = RenderCtx::new(48_000.0, 0);

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        let mut fixed = BreathingOscillator::new(BreathShape::Sine, 0.4, Trajectory::default(), 10.0);
        group.bench_with_input(BenchmarkId::new("fixed_period", size), &size, |b, _| {
            b.iter(|| {
                fixed.render_block(black_box(&mut buffer), black_box(&ctx));
            })
        });

        // Trajectory lookup every sample
        let trajectory = Trajectory::from_points(&[
            TrajectoryPoint::new(6.0, 0.0),
            TrajectoryPoint::new(8.0, 120.0),
            TrajectoryPoint::new(12.0, 600.0),
        ]);
        let mut gliding = BreathingOscillator::new(BreathShape::Triangle, 0.4, trajectory, 10.0);
        group.bench_with_input(BenchmarkId::new("trajectory", size), &size, |b, _| {
            b.iter(|| {
                gliding.render_block(black_box(&mut buffer), black_box(&ctx));
            })
        });
    }

    group.finish();
}
