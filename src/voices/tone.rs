//! Tone voice - a single steady waveform.
//!
//! The simplest track: one oscillator, a gain and a stereo position. Any of
//! the four waveforms can be used, anywhere in the audible band.

use crate::dsp::oscillator::OscillatorWaveform;
use crate::dsp::Smoothing;
use crate::graph::oscillator::{OscNode, OscParam, AUDIBLE_RANGE};
use crate::graph::{GraphNode, Modulatable, RenderCtx};
use crate::voices::{MonoStage, VoiceParam};
use crate::MAX_BLOCK_SIZE;

pub struct ToneVoice {
    osc: OscNode,
    stage: MonoStage,
    scratch: Vec<f32>,
}

impl ToneVoice {
    pub fn new(waveform: OscillatorWaveform, frequency: f32, gain: f32, pan: f32) -> Self {
        Self {
            osc: OscNode::new(waveform, frequency, AUDIBLE_RANGE),
            stage: MonoStage::new(gain, pan),
            scratch: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    pub fn frequency(&self) -> f32 {
        self.osc.get_param(OscParam::Frequency)
    }

    pub fn set_waveform(&mut self, waveform: OscillatorWaveform) {
        self.osc.set_waveform(waveform);
    }

    pub fn render(&mut self, left: &mut [f32], right: &mut [f32], ctx: &RenderCtx) {
        let mono = &mut self.scratch[..left.len()];
        self.osc.render_block(mono, ctx);
        self.stage.write(mono, left, right);
    }

    pub fn set_param(&mut self, param: VoiceParam, value: f32, smoothing: Smoothing, sample_rate: f32) {
        match param {
            VoiceParam::Frequency => {
                self.osc
                    .set_param(OscParam::Frequency, value, smoothing, sample_rate)
            }
            VoiceParam::Gain => self.stage.set_gain(value, smoothing, sample_rate),
            VoiceParam::Pan => self.stage.set_pan(value, smoothing, sample_rate),
            _ => {}
        }
    }
}
