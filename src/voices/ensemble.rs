//! Ensemble voice - a scheduled sequence of enveloped bell strikes.
//!
//! # How It Works
//!
//! 1. The control side resolves every strike up front: start frame, pitch,
//!    level, stereo position and envelope timing
//! 2. Strikes are sorted by start frame; a cursor walks them as the voice's
//!    own clock passes each start
//! 3. Each sounding strike runs its own oscillator, vibrato and
//!    attack/hold/release envelope; finished strikes drop out of the active
//!    list
//! 4. Once the last strike has released, the voice reports itself finished
//!    and the renderer hands it back for teardown
//!
//! All storage is allocated when the voice is built, so rendering never
//! allocates however many strikes overlap.

use crate::dsp::envelope::{Envelope, StrikeTiming};
use crate::dsp::lfo::Vibrato;
use crate::dsp::oscillator::{OscillatorBlock, OscillatorWaveform};
use crate::dsp::pan::pan_gains;
use crate::dsp::{SmoothedValue, Smoothing};
use crate::graph::RenderCtx;
use crate::voices::{clamp_gain, VoiceParam};

/// A fully resolved strike.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strike {
    /// Frames from the start of the voice.
    pub start_frame: u64,
    pub frequency: f32,
    /// Peak level in [0, 1].
    pub level: f32,
    /// Stereo position in [-1, 1].
    pub pan: f32,
    pub timing: StrikeTiming,
    pub vibrato: Vibrato,
}

struct Sounding {
    start_frame: u64,
    frequency: f32,
    vibrato: Vibrato,
    /// Frames since the strike sounded, for the vibrato clock.
    age: u64,
    gains: (f32, f32),
    envelope: Envelope,
    osc: OscillatorBlock,
}

pub struct EnsembleVoice {
    strikes: Vec<Sounding>,
    next: usize,
    active: Vec<usize>,
    frame: u64,
    gain: SmoothedValue,
}

impl EnsembleVoice {
    pub fn new(mut strikes: Vec<Strike>, waveform: OscillatorWaveform, gain: f32) -> Self {
        strikes.sort_by_key(|strike| strike.start_frame);
        let count = strikes.len();
        let strikes = strikes
            .into_iter()
            .map(|strike| Sounding {
                start_frame: strike.start_frame,
                frequency: strike.frequency,
                vibrato: strike.vibrato,
                age: 0,
                gains: pan_gains(strike.pan),
                envelope: Envelope::strike(strike.timing, strike.level),
                osc: OscillatorBlock::new(waveform),
            })
            .collect();

        Self {
            strikes,
            next: 0,
            active: Vec::with_capacity(count),
            frame: 0,
            gain: SmoothedValue::new(clamp_gain(gain)),
        }
    }

    pub fn strike_count(&self) -> usize {
        self.strikes.len()
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.strikes.len() && self.active.is_empty()
    }

    pub fn render(&mut self, left: &mut [f32], right: &mut [f32], ctx: &RenderCtx) {
        let sample_rate = ctx.sample_rate;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            while let Some(strike) = self.strikes.get_mut(self.next) {
                if strike.start_frame > self.frame {
                    break;
                }
                strike.envelope.trigger(sample_rate);
                self.active.push(self.next);
                self.next += 1;
            }

            let mut sum_l = 0.0;
            let mut sum_r = 0.0;
            let mut released = false;
            for &index in &self.active {
                let strike = &mut self.strikes[index];
                let level = strike.envelope.next_sample();
                let frequency = if strike.vibrato.is_active() {
                    strike.frequency * strike.vibrato.ratio_at(strike.age as f64 / sample_rate as f64)
                } else {
                    strike.frequency
                };
                strike.age += 1;
                let sample = strike.osc.next_sample(frequency, sample_rate) * level;
                sum_l += sample * strike.gains.0;
                sum_r += sample * strike.gains.1;
                released |= !strike.envelope.is_active();
            }
            if released {
                let strikes = &self.strikes;
                self.active.retain(|&index| strikes[index].envelope.is_active());
            }

            let gain = self.gain.next();
            *l += sum_l * gain;
            *r += sum_r * gain;
            self.frame += 1;
        }
    }

    pub fn set_param(&mut self, param: VoiceParam, value: f32, smoothing: Smoothing, sample_rate: f32) {
        if param == VoiceParam::Gain {
            self.gain.set(clamp_gain(value), smoothing, sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voices::{test_support::render, TrackVoice};

    fn strike(start_frame: u64, pan: f32) -> Strike {
        Strike {
            start_frame,
            frequency: 440.0,
            level: 0.5,
            pan,
            timing: StrikeTiming::new(0.001, 0.01, 0.01),
            vibrato: Vibrato::default(),
        }
    }

    /// Upward zero crossings per second over `samples`.
    fn crossing_rate(samples: &[f32], sample_rate: f32) -> f32 {
        let crossings = samples
            .windows(2)
            .filter(|pair| pair[0] < 0.0 && pair[1] >= 0.0)
            .count();
        crossings as f32 * sample_rate / samples.len() as f32
    }

    #[test]
    fn vibrato_bends_the_strike_pitch() {
        let sample_rate = 48_000.0;
        let long = StrikeTiming::new(0.001, 1.0, 0.01);
        let plain = Strike {
            start_frame: 0,
            frequency: 440.0,
            level: 0.5,
            pan: 0.0,
            timing: long,
            vibrato: Vibrato::default(),
        };
        let wobbly = Strike {
            vibrato: Vibrato::new(1.0, 1.0),
            ..plain
        };
        let (steady, _) = render(
            &mut TrackVoice::Ensemble(EnsembleVoice::new(vec![plain], OscillatorWaveform::Sine, 1.0)),
            sample_rate,
            480,
            100,
        );
        let (bent, _) = render(
            &mut TrackVoice::Ensemble(EnsembleVoice::new(vec![wobbly], OscillatorWaveform::Sine, 1.0)),
            sample_rate,
            480,
            100,
        );

        // First half of the 1 Hz cycle is sharp, second half flat.
        let quarter = 12_000;
        let steady_rate = crossing_rate(&steady[..quarter * 2], sample_rate);
        let sharp = crossing_rate(&bent[..quarter * 2], sample_rate);
        let flat = crossing_rate(&bent[quarter * 2..quarter * 4], sample_rate);
        assert!((steady_rate - 440.0).abs() < 4.0);
        assert!(sharp > 450.0, "{sharp}");
        assert!(flat < 430.0, "{flat}");
    }

    #[test]
    fn strikes_start_on_their_frame() {
        let sample_rate = 1_000.0;
        let mut voice = TrackVoice::Ensemble(EnsembleVoice::new(
            vec![strike(100, -1.0), strike(10, 1.0)],
            OscillatorWaveform::Square,
            1.0,
        ));
        let (left, right) = render(&mut voice, sample_rate, 50, 4);

        // bell panned right sounds first, starting at frame 10
        assert!(right[..10].iter().all(|s| *s == 0.0));
        assert!(right[10..20].iter().any(|s| s.abs() > 0.1));
        assert!(left[..100].iter().all(|s| s.abs() < 1e-6));
        assert!(left[100..110].iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn finishes_after_last_release() {
        let mut voice = TrackVoice::Ensemble(EnsembleVoice::new(
            vec![strike(0, 0.0), strike(5, 0.0)],
            OscillatorWaveform::Sine,
            1.0,
        ));
        let _ = render(&mut voice, 1_000.0, 20, 1);
        assert!(!voice.is_finished());
        // last strike ends at 5 + 10 + 10 frames
        let _ = render(&mut voice, 1_000.0, 20, 1);
        assert!(voice.is_finished());
    }

    #[test]
    fn overlapping_strikes_stay_bounded() {
        let strikes: Vec<Strike> = (0..32).map(|i| strike(i, 0.0)).collect();
        let mut voice = TrackVoice::Ensemble(EnsembleVoice::new(strikes, OscillatorWaveform::Sine, 1.0));
        let (left, _) = render(&mut voice, 1_000.0, 64, 1);
        assert!(left.iter().all(|s| s.is_finite()));
    }
}
