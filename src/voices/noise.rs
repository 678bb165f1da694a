//! Noise voice - a white, pink or brown bed.

use crate::dsp::noise::NoiseColor;
use crate::dsp::Smoothing;
use crate::graph::noise::NoiseNode;
use crate::graph::{GraphNode, RenderCtx};
use crate::voices::{MonoStage, VoiceParam};
use crate::MAX_BLOCK_SIZE;

pub struct NoiseVoice {
    source: NoiseNode,
    stage: MonoStage,
    scratch: Vec<f32>,
}

impl NoiseVoice {
    pub fn new(color: NoiseColor, gain: f32, pan: f32) -> Self {
        Self::from_node(NoiseNode::new(color), gain, pan)
    }

    /// Reproducible noise for offline renders.
    pub fn seeded(color: NoiseColor, seed: u64, gain: f32, pan: f32) -> Self {
        Self::from_node(NoiseNode::seeded(color, seed), gain, pan)
    }

    fn from_node(source: NoiseNode, gain: f32, pan: f32) -> Self {
        Self {
            source,
            stage: MonoStage::new(gain, pan),
            scratch: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    pub fn color(&self) -> NoiseColor {
        self.source.color()
    }

    pub fn set_color(&mut self, color: NoiseColor) {
        self.source.set_color(color);
    }

    pub fn render(&mut self, left: &mut [f32], right: &mut [f32], ctx: &RenderCtx) {
        let mono = &mut self.scratch[..left.len()];
        self.source.render_block(mono, ctx);
        self.stage.write(mono, left, right);
    }

    pub fn set_param(&mut self, param: VoiceParam, value: f32, smoothing: Smoothing, sample_rate: f32) {
        match param {
            VoiceParam::Gain => self.stage.set_gain(value, smoothing, sample_rate),
            VoiceParam::Pan => self.stage.set_pan(value, smoothing, sample_rate),
            _ => {}
        }
    }
}
