//! Harmonic voice - a weighted stack of partials over one fundamental.
//!
//! The default series follows the Martigli ratios `1, 1.5, 2, 3, 5, 8, 13`
//! (a fifth, then a Fibonacci-like climb). Partial `n` is weighted `1/n` and
//! the weights are normalised so the stack never exceeds the voice gain.
//!
//! Partials that would land at or above Nyquist are skipped rather than
//! folded back as aliases.

use crate::dsp::oscillator::OscillatorWaveform;
use crate::dsp::Smoothing;
use crate::graph::oscillator::{clamp_frequency, OscNode, OscParam, AUDIBLE_RANGE, CARRIER_RANGE};
use crate::graph::{GraphNode, Modulatable, RenderCtx};
use crate::voices::{MonoStage, VoiceParam};
use crate::MAX_BLOCK_SIZE;

pub const MARTIGLI_RATIOS: [f32; 7] = [1.0, 1.5, 2.0, 3.0, 5.0, 8.0, 13.0];

struct Partial {
    osc: OscNode,
    ratio: f32,
    weight: f32,
}

pub struct HarmonicVoice {
    partials: Vec<Partial>,
    fundamental: f32,
    stage: MonoStage,
    scratch: Vec<f32>,
    partial_buf: Vec<f32>,
}

impl HarmonicVoice {
    pub fn new(fundamental: f32, ratios: &[f32], gain: f32, pan: f32) -> Self {
        let fundamental = clamp_frequency(fundamental, CARRIER_RANGE);
        let ratios: Vec<f32> = ratios
            .iter()
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
            .collect();
        let ratios = if ratios.is_empty() {
            MARTIGLI_RATIOS.to_vec()
        } else {
            ratios
        };

        let total: f32 = (1..=ratios.len()).map(|n| 1.0 / n as f32).sum();
        let partials = ratios
            .iter()
            .enumerate()
            .map(|(index, &ratio)| Partial {
                osc: OscNode::new(OscillatorWaveform::Sine, fundamental * ratio, AUDIBLE_RANGE),
                ratio,
                weight: (1.0 / (index + 1) as f32) / total,
            })
            .collect();

        Self {
            partials,
            fundamental,
            stage: MonoStage::new(gain, pan),
            scratch: vec![0.0; MAX_BLOCK_SIZE],
            partial_buf: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    pub fn fundamental(&self) -> f32 {
        self.fundamental
    }

    pub fn render(&mut self, left: &mut [f32], right: &mut [f32], ctx: &RenderCtx) {
        let frames = left.len();
        let mono = &mut self.scratch[..frames];
        mono.fill(0.0);

        let ceiling = (ctx.sample_rate * 0.5).min(AUDIBLE_RANGE.1);
        for partial in &mut self.partials {
            if self.fundamental * partial.ratio >= ceiling {
                continue;
            }
            let buffer = &mut self.partial_buf[..frames];
            partial.osc.render_block(buffer, ctx);
            for (out, sample) in mono.iter_mut().zip(buffer.iter()) {
                *out += sample * partial.weight;
            }
        }

        self.stage.write(mono, left, right);
    }

    pub fn set_param(&mut self, param: VoiceParam, value: f32, smoothing: Smoothing, sample_rate: f32) {
        match param {
            VoiceParam::Frequency => {
                self.fundamental = clamp_frequency(value, CARRIER_RANGE);
                for partial in &mut self.partials {
                    partial.osc.set_param(
                        OscParam::Frequency,
                        self.fundamental * partial.ratio,
                        smoothing,
                        sample_rate,
                    );
                }
            }
            VoiceParam::Gain => self.stage.set_gain(value, smoothing, sample_rate),
            VoiceParam::Pan => self.stage.set_pan(value, smoothing, sample_rate),
            _ => {}
        }
    }
}
