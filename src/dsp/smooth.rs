//! Parameter smoothing: linear ramps and exponential approach.

/*
Why Smooth Parameters?
======================

Jumping a gain or frequency from one value to another between two samples
puts a discontinuity in the waveform, which is heard as a click or zipper
noise. Every live parameter therefore moves toward its target over time.

LINEAR RAMP
    Reach the target after exactly N samples.
        step = (target - current) / N
    Used for fades, where the length of the fade matters.

EXPONENTIAL APPROACH
    Close a fixed fraction of the remaining gap each sample.
        current += (target - current) * (1 - e^(-1 / (tau * sample_rate)))
    After one time constant tau the value has covered ~63% of the gap,
    after five it is within 1%. Used for control-rate updates (modulation,
    pan automation) that arrive every few tens of milliseconds: each new
    target simply redirects the curve, so there is no stepping.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const SETTLE_EPSILON: f32 = 1e-6;

/// How a parameter should travel to a new target.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Smoothing {
    Immediate,
    Exponential { time_constant: f32 },
    Linear { duration: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Ramp {
    Settled,
    Exponential { coeff: f32 },
    Linear { step: f32, remaining: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct SmoothedValue {
    current: f32,
    target: f32,
    ramp: Ramp,
}

impl SmoothedValue {
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            ramp: Ramp::Settled,
        }
    }

    /// Start moving toward `target`.
    pub fn set(&mut self, target: f32, smoothing: Smoothing, sample_rate: f32) {
        self.target = target;
        self.ramp = match smoothing {
            Smoothing::Immediate => {
                self.current = target;
                Ramp::Settled
            }
            Smoothing::Exponential { time_constant } => {
                let samples = (time_constant * sample_rate).max(1.0);
                Ramp::Exponential {
                    coeff: 1.0 - (-1.0 / samples).exp(),
                }
            }
            Smoothing::Linear { duration } => {
                let remaining = (duration * sample_rate).round().max(1.0) as u32;
                Ramp::Linear {
                    step: (target - self.current) / remaining as f32,
                    remaining,
                }
            }
        };
    }

    /// Advance one sample and return the new value.
    #[inline]
    pub fn next(&mut self) -> f32 {
        match &mut self.ramp {
            Ramp::Settled => {}
            Ramp::Exponential { coeff } => {
                self.current += (self.target - self.current) * *coeff;
                if (self.target - self.current).abs() < SETTLE_EPSILON {
                    self.current = self.target;
                    self.ramp = Ramp::Settled;
                }
            }
            Ramp::Linear { step, remaining } => {
                *remaining -= 1;
                if *remaining == 0 {
                    self.current = self.target;
                    self.ramp = Ramp::Settled;
                } else {
                    self.current += *step;
                }
            }
        }
        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.ramp, Ramp::Settled)
    }
}
