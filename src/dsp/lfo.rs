//! Low Frequency Oscillator helpers.

/*
Low Frequency Oscillators
=========================

An LFO is an oscillator running below the audible range (~0.01 Hz to
~20 Hz). Here they move stereo position rather than make sound: a slow sine
sweeping a tone between the ears, or the breathing signal itself.

  bipolar     Output swings -1.0 to +1.0. Pan positions are bipolar:
              -1 is hard left, +1 hard right.
  unipolar    Output stays in 0.0 to 1.0. Pan laws want unipolar input.

    unipolar = (bipolar + 1.0) * 0.5

    bipolar   unipolar
    -1.0      0.0
     0.0      0.5
    +1.0      1.0

Phase Offsets
-------------

Two LFOs at the same rate, a quarter cycle (pi/2) apart, trace a circle:
when one is at its extreme the other crosses the middle. Dichotic pan
automation uses this so the two tones of a beat orbit each other instead of
moving in lockstep.

Vibrato
-------

The same sine, moving pitch instead of position. Depth 1.0 swings a
semitone either way; the ratio applied to the frequency is

    2 ^ (depth · sin(2π·f·t) / 12)
*/

use std::f64::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Convert bipolar signal (-1.0 to +1.0) to unipolar (0.0 to 1.0).
#[inline]
pub fn bipolar_to_unipolar(bipolar: f32) -> f32 {
    (bipolar + 1.0) * 0.5
}

/// Sine LFO evaluated at absolute time: sin(2π·f·t + φ).
#[inline]
pub fn sine_at(time: f64, frequency_hz: f32, phase_radians: f32) -> f32 {
    (TAU * frequency_hz as f64 * time + phase_radians as f64).sin() as f32
}

/// Pitch wobble applied to each bell strike from its onset.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vibrato {
    /// Hz. Zero disables vibrato.
    pub rate_hz: f32,
    /// 0 to 1, where 1 is a semitone either way.
    pub depth: f32,
}

impl Vibrato {
    pub fn new(rate_hz: f32, depth: f32) -> Self {
        let finite = |v: f32| if v.is_finite() { v } else { 0.0 };
        Self {
            rate_hz: finite(rate_hz).clamp(0.0, 20.0),
            depth: finite(depth).clamp(0.0, 1.0),
        }
    }

    pub fn is_active(&self) -> bool {
        self.rate_hz > 0.0 && self.depth > 0.0
    }

    /// Frequency ratio at `time` seconds after the strike.
    #[inline]
    pub fn ratio_at(&self, time: f64) -> f32 {
        if !self.is_active() {
            return 1.0;
        }
        (self.depth * sine_at(time, self.rate_hz, 0.0) / 12.0).exp2()
    }
}
