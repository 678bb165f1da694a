//! Reference presets, one per track kind.

use biosyn_dsp::dsp::noise::NoiseColor;
use biosyn_dsp::engine::params::TrackParams;
use biosyn_dsp::synth::modulation::{ModParam, ModulationParam};
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// 440 Hz sine
    Sine,
    /// 200 Hz carrier, 10 Hz beat, one tone per ear
    Binaural,
    /// 210 Hz carrier, 6 Hz beat, summed
    Monaural,
    /// 180 Hz tone pulsed at 12 Hz
    Isochronic,
    /// Martigli partials over 220 Hz
    Harmonic,
    White,
    Pink,
    Brown,
}

impl Preset {
    pub fn params(self) -> TrackParams {
        match self {
            Preset::Sine => TrackParams::tone(440.0),
            Preset::Binaural => TrackParams::binaural(200.0, 10.0),
            Preset::Monaural => TrackParams::monaural(210.0, 6.0),
            Preset::Isochronic => TrackParams::isochronic(180.0, 12.0),
            Preset::Harmonic => TrackParams::harmonic(220.0),
            Preset::White => TrackParams::noise(NoiseColor::White),
            Preset::Pink => TrackParams::noise(NoiseColor::Pink),
            Preset::Brown => TrackParams::noise(NoiseColor::Brown),
        }
    }

    /// Gain swell following the breath: 0.3 ± 0.15.
    pub fn breathing_gain() -> Vec<ModulationParam> {
        vec![ModulationParam::new(ModParam::Gain, 0.3, 0.15, 0.0, 1.0)]
    }
}
