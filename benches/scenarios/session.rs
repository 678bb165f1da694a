//! A full session: every track kind at once, breathing modulation on,
//! rendered through the renderer the way the audio callback drives it.

use std::hint::black_box;

use biosyn_dsp::dsp::noise::NoiseColor;
use biosyn_dsp::engine::{Engine, TrackParams, TrackSpec};
use biosyn_dsp::synth::modulation::{ModParam, ModulationParam};
use biosyn_dsp::EngineConfig;
use criterion::{BenchmarkId, Criterion};

use crate::BLOCK_SIZES;

pub fn bench_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/session");

    for &size in BLOCK_SIZES {
        let mut engine = Engine::new(EngineConfig::default());
        let Ok(mut renderer) = engine.init(48_000.0) else {
            return;
        };
        let swell = vec![ModulationParam::new(ModParam::Gain, 0.2, 0.1, 0.0, 1.0)];
        for params in [
            TrackParams::binaural(200.0, 10.0),
            TrackParams::monaural(210.0, 6.0),
            TrackParams::isochronic(180.0, 12.0),
            TrackParams::harmonic(220.0),
            TrackParams::noise(NoiseColor::Pink),
        ] {
            let _ = engine.start(TrackSpec::new(params).with_modulation(swell.clone()));
        }

        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];
        group.bench_with_input(BenchmarkId::new("five_tracks", size), &size, |b, _| {
            b.iter(|| {
                renderer.process(black_box(&mut left), black_box(&mut right));
                engine.tick();
            })
        });
    }

    group.finish();
}
