//! Ready-made voices, one per track kind.
//!
//! Each voice is a small node graph that renders stereo into the buffers it
//! is handed, adding to whatever is already there. The renderer owns voices
//! through [`TrackVoice`], a tagged union over the kinds, so dispatch is a
//! `match` rather than a virtual call and every variant only carries the
//! signal path it needs.
//!
//! # Example
//!
//! ```ignore
//! use biosyn_dsp::voices::{BeatVoice, MixMode, TrackVoice};
//!
//! // 200 Hz carrier, 10 Hz binaural beat, hard-panned pair
//! let voice = TrackVoice::Beat(BeatVoice::new(195.0, 205.0, MixMode::Dichotic, 0.3, (-1.0, 1.0)));
//! ```

mod beat;
mod ensemble;
mod harmonic;
mod isochronic;
mod noise;
mod tone;

pub use beat::{BeatVoice, MixMode};
pub use ensemble::{EnsembleVoice, Strike};
pub use harmonic::{HarmonicVoice, MARTIGLI_RATIOS};
pub use isochronic::IsochronicVoice;
pub use noise::NoiseVoice;
pub use tone::ToneVoice;

use crate::dsp::noise::NoiseColor;
use crate::dsp::oscillator::OscillatorWaveform;
use crate::dsp::{SmoothedValue, Smoothing};
use crate::graph::{panner::Panner, RenderCtx};

/// Live parameters a voice accepts from the control side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceParam {
    /// Main frequency (tone, isochronic carrier, harmonic fundamental).
    Frequency,
    LeftFrequency,
    RightFrequency,
    Gain,
    PulseRate,
    DutyCycle,
    /// Position of a single-channel voice, or both channels of a pair.
    Pan,
    PanLeft,
    PanRight,
}

/// Discrete changes that are not smoothed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VoiceChange {
    Waveform(OscillatorWaveform),
    MixMode(MixMode),
    NoiseColor(NoiseColor),
}

pub enum TrackVoice {
    Tone(ToneVoice),
    Beat(BeatVoice),
    Isochronic(IsochronicVoice),
    Harmonic(HarmonicVoice),
    Noise(NoiseVoice),
    Ensemble(EnsembleVoice),
}

impl TrackVoice {
    /// Add one block into `left`/`right`. Both slices have the same length,
    /// at most [`crate::MAX_BLOCK_SIZE`].
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32], ctx: &RenderCtx) {
        match self {
            TrackVoice::Tone(voice) => voice.render(left, right, ctx),
            TrackVoice::Beat(voice) => voice.render(left, right, ctx),
            TrackVoice::Isochronic(voice) => voice.render(left, right, ctx),
            TrackVoice::Harmonic(voice) => voice.render(left, right, ctx),
            TrackVoice::Noise(voice) => voice.render(left, right, ctx),
            TrackVoice::Ensemble(voice) => voice.render(left, right, ctx),
        }
    }

    /// Parameters a voice does not have are ignored.
    pub fn set_param(&mut self, param: VoiceParam, value: f32, smoothing: Smoothing, sample_rate: f32) {
        match self {
            TrackVoice::Tone(voice) => voice.set_param(param, value, smoothing, sample_rate),
            TrackVoice::Beat(voice) => voice.set_param(param, value, smoothing, sample_rate),
            TrackVoice::Isochronic(voice) => voice.set_param(param, value, smoothing, sample_rate),
            TrackVoice::Harmonic(voice) => voice.set_param(param, value, smoothing, sample_rate),
            TrackVoice::Noise(voice) => voice.set_param(param, value, smoothing, sample_rate),
            TrackVoice::Ensemble(voice) => voice.set_param(param, value, smoothing, sample_rate),
        }
    }

    pub fn configure(&mut self, change: VoiceChange) {
        match (self, change) {
            (TrackVoice::Tone(voice), VoiceChange::Waveform(waveform)) => voice.set_waveform(waveform),
            (TrackVoice::Beat(voice), VoiceChange::MixMode(mode)) => voice.set_mix_mode(mode),
            (TrackVoice::Noise(voice), VoiceChange::NoiseColor(color)) => voice.set_color(color),
            _ => {}
        }
    }

    /// Finite voices (strike ensembles) report completion here.
    pub fn is_finished(&self) -> bool {
        match self {
            TrackVoice::Ensemble(voice) => voice.is_finished(),
            _ => false,
        }
    }
}

pub fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        0.0
    } else {
        gain.clamp(0.0, 1.0)
    }
}

/// Gain then pan: the tail shared by every single-channel voice.
pub(crate) struct MonoStage {
    gain: SmoothedValue,
    panner: Panner,
}

impl MonoStage {
    pub(crate) fn new(gain: f32, pan: f32) -> Self {
        Self {
            gain: SmoothedValue::new(clamp_gain(gain)),
            panner: Panner::new(pan),
        }
    }

    pub(crate) fn set_gain(&mut self, gain: f32, smoothing: Smoothing, sample_rate: f32) {
        self.gain.set(clamp_gain(gain), smoothing, sample_rate);
    }

    pub(crate) fn set_pan(&mut self, pan: f32, smoothing: Smoothing, sample_rate: f32) {
        self.panner.set_position(pan, smoothing, sample_rate);
    }

    pub(crate) fn write(&mut self, mono: &mut [f32], left: &mut [f32], right: &mut [f32]) {
        for sample in mono.iter_mut() {
            *sample *= self.gain.next();
        }
        self.panner.process(mono, left, right);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Render `blocks` blocks of `size` frames and return the stereo result.
    pub fn render(voice: &mut TrackVoice, sample_rate: f32, size: usize, blocks: usize) -> (Vec<f32>, Vec<f32>) {
        let mut left = Vec::with_capacity(size * blocks);
        let mut right = Vec::with_capacity(size * blocks);
        let mut block_l = vec![0.0; size];
        let mut block_r = vec![0.0; size];
        for index in 0..blocks {
            block_l.fill(0.0);
            block_r.fill(0.0);
            let ctx = RenderCtx::new(sample_rate, (index * size) as u64);
            voice.render(&mut block_l, &mut block_r, &ctx);
            left.extend_from_slice(&block_l);
            right.extend_from_slice(&block_r);
        }
        (left, right)
    }
}
