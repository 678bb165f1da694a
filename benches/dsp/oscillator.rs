//! Benchmarks for oscillator waveform generation.

use std::hint::black_box;

use biosyn_dsp::dsp::oscillator::{OscillatorBlock, OscillatorWaveform};
use biosyn_dsp::graph::oscillator::OscNode;
use biosyn_dsp::graph::pulse::PulseGate;
use biosyn_dsp::graph::{GraphNode, RenderCtx};
use criterion::{BenchmarkId, Criterion};

use crate::BLOCK_SIZES;

pub fn bench_oscillator(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/oscillator");
    let ctx = RenderCtx::new(48_000.0, 0);

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        for waveform in [
            OscillatorWaveform::Sine,
            OscillatorWaveform::Square,
            OscillatorWaveform::Sawtooth,
            OscillatorWaveform::Triangle,
        ] {
            let mut osc = OscillatorBlock::new(waveform);
            group.bench_with_input(BenchmarkId::new(waveform.name(), size), &size, |b, _| {
                b.iter(|| {
                    osc.render(black_box(&mut buffer), black_box(440.0), 48_000.0);
                })
            });
        }

        // Smoothed frequency, per-sample clamp
        let mut node = OscNode::sine(200.0);
        group.bench_with_input(BenchmarkId::new("node", size), &size, |b, _| {
            b.iter(|| {
                node.render_block(black_box(&mut buffer), black_box(&ctx));
            })
        });

        // Soft-edged pulse train
        let mut gate = PulseGate::new(12.0, 0.5);
        group.bench_with_input(BenchmarkId::new("pulse_gate", size), &size, |b, _| {
            b.iter(|| {
                gate.render_block(black_box(&mut buffer), black_box(&ctx));
            })
        });
    }

    group.finish();
}
