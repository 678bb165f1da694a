use crate::dsp::oscillator::{OscillatorBlock, OscillatorWaveform};
use crate::dsp::{SmoothedValue, Smoothing};
use crate::graph::node::{GraphNode, Modulatable, RenderCtx};

/*
Audio Oscillator
================

The tone generator behind every pitched track. Unlike a keyboard synth the
pitch does not come from a note: each oscillator owns its frequency as a
smoothed parameter, so modulation and updates glide instead of stepping.

  Sine       Pure tone, the default for beats and isochronic carriers.
  Square     Odd harmonics, hollow and buzzy.
  Sawtooth   All harmonics, bright.
  Triangle   Weak odd harmonics, soft.

Frequencies are clamped to a range chosen by the owner: carriers for
beats live in 20..4000 Hz, plain tones may use the full 20..20000 Hz band.
*/

pub const AUDIBLE_RANGE: (f32, f32) = (20.0, 20_000.0);
pub const CARRIER_RANGE: (f32, f32) = (20.0, 4_000.0);

pub struct OscNode {
    osc: OscillatorBlock,
    frequency: SmoothedValue,
    range: (f32, f32),
    /// Detune in cents (100 cents = 1 semitone).
    detune_cents: f32,
}

/// Parameters that can be modulated on an oscillator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OscParam {
    /// Oscillator frequency in Hz
    Frequency,
    /// Detune in cents (100 cents = 1 semitone)
    Detune,
}

impl OscNode {
    pub fn new(waveform: OscillatorWaveform, frequency: f32, range: (f32, f32)) -> Self {
        Self {
            osc: OscillatorBlock::new(waveform),
            frequency: SmoothedValue::new(clamp_frequency(frequency, range)),
            range,
            detune_cents: 0.0,
        }
    }

    pub fn sine(frequency: f32) -> Self {
        Self::new(OscillatorWaveform::Sine, frequency, AUDIBLE_RANGE)
    }

    pub fn with_detune(mut self, cents: f32) -> Self {
        self.detune_cents = cents.clamp(-1_200.0, 1_200.0);
        self
    }

    pub fn set_waveform(&mut self, waveform: OscillatorWaveform) {
        self.osc.set_waveform(waveform);
    }

    pub fn waveform(&self) -> OscillatorWaveform {
        self.osc.waveform()
    }

    /// Produce one sample at the current (smoothed, detuned) frequency.
    #[inline]
    pub fn next_sample(&mut self, sample_rate: f32) -> f32 {
        let base = self.frequency.next();
        let frequency = if self.detune_cents != 0.0 {
            base * 2.0_f32.powf(self.detune_cents / 1200.0)
        } else {
            base
        };
        self.osc.next_sample(frequency, sample_rate)
    }
}

pub fn clamp_frequency(frequency: f32, range: (f32, f32)) -> f32 {
    if frequency.is_nan() {
        range.0
    } else {
        frequency.clamp(range.0, range.1)
    }
}

impl GraphNode for OscNode {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        for sample in out.iter_mut() {
            *sample = self.next_sample(ctx.sample_rate);
        }
    }
}

impl Modulatable for OscNode {
    type Param = OscParam;

    fn get_param(&self, param: Self::Param) -> f32 {
        match param {
            OscParam::Frequency => self.frequency.target(),
            OscParam::Detune => self.detune_cents,
        }
    }

    fn set_param(&mut self, param: Self::Param, value: f32, smoothing: Smoothing, sample_rate: f32) {
        match param {
            OscParam::Frequency => {
                self.frequency
                    .set(clamp_frequency(value, self.range), smoothing, sample_rate);
            }
            OscParam::Detune => {
                self.detune_cents = value.clamp(-1_200.0, 1_200.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    #[test]
    fn valid_sine() {
        let sample_rate = 48_000.0;
        let ctx = RenderCtx::new(sample_rate, 0);
        let mut osc = OscNode::sine(440.0);

        let mut buffer = vec![0.0f32; 128];
        osc.render_block(&mut buffer, &ctx);

        // sample n should be sin(2pi f n / sr)
        let sample_index = 12;
        let expected = (TAU * 440.0 * sample_index as f32 / sample_rate).sin();
        let actual = buffer[sample_index];
        assert!(
            (actual - expected).abs() < 1e-5,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn frequency_is_clamped_to_range() {
        let mut osc = OscNode::new(OscillatorWaveform::Sine, 9_000.0, CARRIER_RANGE);
        assert_eq!(osc.get_param(OscParam::Frequency), 4_000.0);
        osc.set_param(OscParam::Frequency, 5.0, Smoothing::Immediate, 48_000.0);
        assert_eq!(osc.get_param(OscParam::Frequency), 20.0);
    }
}
