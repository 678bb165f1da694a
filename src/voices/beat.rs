//! Beat voice - two tones a few hertz apart.
//!
//! Binaural and monaural beats are the same pair of oscillators; only the
//! output stage differs.
//!
//! # How It Works
//!
//! 1. Two sine oscillators, `left` and `right`, tuned `beat` Hz apart
//! 2. Dichotic: each tone gets its own stereo position, so with the default
//!    hard panning each ear hears one tone and the beat is perceived
//!    centrally
//! 3. Monaural: the tones are summed at half amplitude into one signal and
//!    placed at a single position, so the beat is acoustic
//!
//! Switching modes at runtime keeps the oscillator phases, so there is no
//! restart click.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::{SmoothedValue, Smoothing};
use crate::graph::extensions::NodeExt;
use crate::graph::mix::Mix;
use crate::graph::oscillator::{OscNode, OscParam, CARRIER_RANGE};
use crate::graph::panner::Panner;
use crate::graph::{GraphNode, Modulatable, RenderCtx};
use crate::voices::{clamp_gain, VoiceParam};
use crate::dsp::oscillator::OscillatorWaveform;
use crate::MAX_BLOCK_SIZE;

/// How the two tones of a beat pair reach the ears.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MixMode {
    /// Separate left/right positions (binaural).
    #[default]
    Dichotic,
    /// Both tones summed and sent to the same position.
    Monaural,
}

pub struct BeatVoice {
    pair: Mix<OscNode, OscNode>,
    mode: MixMode,
    gain: SmoothedValue,
    left_pan: Panner,
    right_pan: Panner,
    scratch_a: Vec<f32>,
    scratch_b: Vec<f32>,
}

impl BeatVoice {
    pub fn new(left_hz: f32, right_hz: f32, mode: MixMode, gain: f32, pans: (f32, f32)) -> Self {
        let left = OscNode::new(OscillatorWaveform::Sine, left_hz, CARRIER_RANGE);
        let right = OscNode::new(OscillatorWaveform::Sine, right_hz, CARRIER_RANGE);
        Self {
            pair: left.mix(right, 0.5),
            mode,
            gain: SmoothedValue::new(clamp_gain(gain)),
            left_pan: Panner::new(pans.0),
            right_pan: Panner::new(pans.1),
            scratch_a: vec![0.0; MAX_BLOCK_SIZE],
            scratch_b: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    pub fn mix_mode(&self) -> MixMode {
        self.mode
    }

    pub fn set_mix_mode(&mut self, mode: MixMode) {
        self.mode = mode;
    }

    pub fn frequencies(&self) -> (f32, f32) {
        (
            self.pair.source_a.get_param(OscParam::Frequency),
            self.pair.source_b.get_param(OscParam::Frequency),
        )
    }

    pub fn pans(&self) -> (f32, f32) {
        (self.left_pan.position(), self.right_pan.position())
    }

    pub fn render(&mut self, left: &mut [f32], right: &mut [f32], ctx: &RenderCtx) {
        let frames = left.len();
        match self.mode {
            MixMode::Monaural => {
                let mono = &mut self.scratch_a[..frames];
                self.pair.render_block(mono, ctx);
                for sample in mono.iter_mut() {
                    *sample *= self.gain.next();
                }
                self.left_pan.process(mono, left, right);
            }
            MixMode::Dichotic => {
                let tone_a = &mut self.scratch_a[..frames];
                let tone_b = &mut self.scratch_b[..frames];
                self.pair.source_a.render_block(tone_a, ctx);
                self.pair.source_b.render_block(tone_b, ctx);
                for (a, b) in tone_a.iter_mut().zip(tone_b.iter_mut()) {
                    let gain = self.gain.next();
                    *a *= gain;
                    *b *= gain;
                }
                self.left_pan.process(tone_a, left, right);
                self.right_pan.process(tone_b, left, right);
            }
        }
    }

    pub fn set_param(&mut self, param: VoiceParam, value: f32, smoothing: Smoothing, sample_rate: f32) {
        match param {
            VoiceParam::LeftFrequency => {
                self.pair
                    .source_a
                    .set_param(OscParam::Frequency, value, smoothing, sample_rate)
            }
            VoiceParam::RightFrequency => {
                self.pair
                    .source_b
                    .set_param(OscParam::Frequency, value, smoothing, sample_rate)
            }
            VoiceParam::Gain => self.gain.set(clamp_gain(value), smoothing, sample_rate),
            VoiceParam::PanLeft => self.left_pan.set_position(value, smoothing, sample_rate),
            VoiceParam::PanRight => self.right_pan.set_position(value, smoothing, sample_rate),
            VoiceParam::Pan => {
                self.left_pan.set_position(value, smoothing, sample_rate);
                self.right_pan.set_position(value, smoothing, sample_rate);
            }
            _ => {}
        }
    }
}
