//! Isochronic voice - a carrier switched on and off at a steady rate.
//!
//! Unlike beats, the rhythm is explicit: a pulse gate multiplies the carrier,
//! so the tone is heard as evenly spaced bursts at `pulse_rate` Hz.

use crate::dsp::Smoothing;
use crate::graph::amplify::Amplify;
use crate::graph::extensions::NodeExt;
use crate::graph::oscillator::{OscNode, OscParam, CARRIER_RANGE};
use crate::graph::pulse::{PulseGate, PulseParam};
use crate::graph::{GraphNode, Modulatable, RenderCtx};
use crate::dsp::oscillator::OscillatorWaveform;
use crate::voices::{MonoStage, VoiceParam};
use crate::MAX_BLOCK_SIZE;

pub struct IsochronicVoice {
    tone: Amplify<OscNode, PulseGate>,
    stage: MonoStage,
    scratch: Vec<f32>,
}

impl IsochronicVoice {
    pub fn new(frequency: f32, pulse_rate: f32, duty_cycle: f32, gain: f32, pan: f32) -> Self {
        let carrier = OscNode::new(OscillatorWaveform::Sine, frequency, CARRIER_RANGE);
        Self {
            tone: carrier.amplify(PulseGate::new(pulse_rate, duty_cycle)),
            stage: MonoStage::new(gain, pan),
            scratch: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    pub fn pulse_rate(&self) -> f32 {
        self.tone.modulator.get_param(PulseParam::Rate)
    }

    pub fn render(&mut self, left: &mut [f32], right: &mut [f32], ctx: &RenderCtx) {
        let mono = &mut self.scratch[..left.len()];
        self.tone.render_block(mono, ctx);
        self.stage.write(mono, left, right);
    }

    pub fn set_param(&mut self, param: VoiceParam, value: f32, smoothing: Smoothing, sample_rate: f32) {
        match param {
            VoiceParam::Frequency => {
                self.tone
                    .signal
                    .set_param(OscParam::Frequency, value, smoothing, sample_rate)
            }
            VoiceParam::PulseRate => {
                self.tone
                    .modulator
                    .set_param(PulseParam::Rate, value, smoothing, sample_rate)
            }
            VoiceParam::DutyCycle => {
                self.tone
                    .modulator
                    .set_param(PulseParam::Duty, value, smoothing, sample_rate)
            }
            VoiceParam::Gain => self.stage.set_gain(value, smoothing, sample_rate),
            VoiceParam::Pan => self.stage.set_pan(value, smoothing, sample_rate),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::meter::rms;
    use crate::voices::{test_support::render, TrackVoice};

    #[test]
    fn pulses_alternate_between_sound_and_silence() {
        let sample_rate = 48_000.0;
        let mut voice = TrackVoice::Isochronic(IsochronicVoice::new(180.0, 12.0, 0.5, 0.5, 0.0));
        let (left, _) = render(&mut voice, sample_rate, 500, 8);

        // 12 Hz → 4000 samples per pulse, open for the first half
        let open = rms(&left[200..1_800]);
        let closed = rms(&left[2_600..3_800]);
        assert!(open > 0.2, "open rms {open}");
        assert!(closed < 1e-3, "closed rms {closed}");
    }

    #[test]
    fn pulse_rate_is_clamped() {
        let mut voice = IsochronicVoice::new(180.0, 12.0, 0.5, 0.5, 0.0);
        voice.set_param(VoiceParam::PulseRate, 90.0, Smoothing::Immediate, 48_000.0);
        assert_eq!(voice.pulse_rate(), 40.0);
    }
}
