//! Benchmarks for noise generation.

use std::hint::black_box;

use biosyn_dsp::dsp::noise::{NoiseColor, NoiseSource};
use criterion::{BenchmarkId, Criterion};

use crate::BLOCK_SIZES;

pub fn bench_noise(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/noise");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        for color in [NoiseColor::White, NoiseColor::Pink, NoiseColor::Brown] {
            let mut noise = NoiseSource::with_seed(color, 7);
            group.bench_with_input(BenchmarkId::new(color.name(), size), &size, |b, _| {
                b.iter(|| {
                    noise.render(black_box(&mut buffer));
                })
            });
        }
    }

    group.finish();
}
