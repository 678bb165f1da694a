//! Benchmarks for complete track voices.

use std::hint::black_box;

use biosyn_dsp::dsp::noise::NoiseColor;
use biosyn_dsp::dsp::oscillator::OscillatorWaveform;
use biosyn_dsp::graph::RenderCtx;
use biosyn_dsp::voices::{
    BeatVoice, HarmonicVoice, IsochronicVoice, MixMode, NoiseVoice, ToneVoice, TrackVoice,
    MARTIGLI_RATIOS,
};
use criterion::{BenchmarkId, Criterion};

use crate::BLOCK_SIZES;

fn voices() -> Vec<(&'static str, TrackVoice)> {
    vec![
        (
            "tone",
            TrackVoice::Tone(ToneVoice::new(OscillatorWaveform::Sine, 440.0, 0.3, 0.0)),
        ),
        (
            "binaural",
            TrackVoice::Beat(BeatVoice::new(195.0, 205.0, MixMode::Dichotic, 0.3, (-1.0, 1.0))),
        ),
        (
            "monaural",
            TrackVoice::Beat(BeatVoice::new(207.0, 213.0, MixMode::Monaural, 0.3, (0.0, 0.0))),
        ),
        (
            "isochronic",
            TrackVoice::Isochronic(IsochronicVoice::new(180.0, 12.0, 0.5, 0.3, 0.0)),
        ),
        (
            "harmonic",
            TrackVoice::Harmonic(HarmonicVoice::new(220.0, &MARTIGLI_RATIOS, 0.3, 0.0)),
        ),
        (
            "pink_noise",
            TrackVoice::Noise(NoiseVoice::seeded(NoiseColor::Pink, 3, 0.2, 0.0)),
        ),
    ]
}

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voices");
    let ctx = RenderCtx::new(48_000.0, 0);

    for &size in BLOCK_SIZES {
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];

        for (name, mut voice) in voices() {
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    voice.render(black_box(&mut left), black_box(&mut right), black_box(&ctx));
                })
            });
        }
    }

    group.finish();
}
