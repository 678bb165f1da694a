//! Stereo position automation for beat pairs.

/*
Pan Modes
=========

A beat track has two logical channels (the two tones of the pair). Every
mode yields one position per channel in [-1, 1]:

  static          fixed positions; hard left / hard right around `offset`
                  when dichotic, both at `offset` when monaural
  sine LFO        offset + depth · sin(2π·f·t + φ)
  breathing sync  offset + depth · breath
  crossfade       hold at one extreme, ramp across, hold at the other ...

      +1 ┤      ╱────╲
         │     ╱      ╲
      -1 ┼────╱        ╲────
         |hold|fade|hold|fade|
         |<-cycle->|

In dichotic mode the right channel is a quarter cycle ahead of the left
(sine, breathing) or mirrors it around the offset (crossfade), so the two tones move
against each other. In monaural mode both channels share one position.

A depth of zero, or the static mode, resolves straight to the static
positions and needs no timer.
*/

use std::f32::consts::FRAC_PI_2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::lfo::sine_at;
use crate::dsp::pan::clamp_pan;
use crate::voices::MixMode;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "mode", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PanMode {
    #[default]
    Static,
    SineLfo {
        /// Hz.
        frequency: f32,
        /// Radians.
        #[cfg_attr(feature = "serde", serde(default))]
        phase: f32,
    },
    BreathingSync,
    Crossfade {
        hold_secs: f32,
        fade_secs: f32,
    },
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanConfig {
    pub mode: PanMode,
    pub depth: f32,
    pub offset: f32,
}

impl Default for PanConfig {
    fn default() -> Self {
        Self {
            mode: PanMode::Static,
            depth: 1.0,
            offset: 0.0,
        }
    }
}

impl PanConfig {
    pub fn with_mode(mode: PanMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn sanitized(self) -> Self {
        let finite = |v: f32, fallback: f32| if v.is_finite() { v } else { fallback };
        let mode = match self.mode {
            PanMode::SineLfo { frequency, phase } => PanMode::SineLfo {
                frequency: finite(frequency, 0.0).clamp(0.0, 20.0),
                phase: finite(phase, 0.0),
            },
            PanMode::Crossfade {
                hold_secs,
                fade_secs,
            } => PanMode::Crossfade {
                hold_secs: finite(hold_secs, 0.0).max(0.0),
                fade_secs: finite(fade_secs, 0.0).max(0.0),
            },
            other => other,
        };
        Self {
            mode,
            depth: finite(self.depth, 0.0).clamp(0.0, 1.0),
            offset: clamp_pan(self.offset),
        }
    }

    /// Whether positions change over time.
    pub fn is_animated(&self) -> bool {
        let moving = match self.mode {
            PanMode::Static => false,
            PanMode::SineLfo { frequency, .. } => frequency > 0.0,
            PanMode::BreathingSync => true,
            PanMode::Crossfade {
                hold_secs,
                fade_secs,
            } => hold_secs + fade_secs > 0.0,
        };
        moving && self.depth > 0.0
    }
}

/// Positions used when nothing is animated.
pub fn static_positions(mix: MixMode, offset: f32) -> (f32, f32) {
    let offset = clamp_pan(offset);
    match mix {
        MixMode::Dichotic => (clamp_pan(offset - 1.0), clamp_pan(offset + 1.0)),
        MixMode::Monaural => (offset, offset),
    }
}

/// Breathing values a pan tick needs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BreathSample {
    pub value: f32,
    /// Value a quarter cycle ahead of `value`.
    pub quarter_ahead: f32,
}

/// Pan automation of one beat track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanAutomation {
    config: PanConfig,
    mix: MixMode,
    /// Audio time the current mode started at.
    started: f64,
}

impl PanAutomation {
    pub fn new(config: PanConfig, mix: MixMode, now: f64) -> Self {
        Self {
            config: config.sanitized(),
            mix,
            started: now,
        }
    }

    pub fn config(&self) -> PanConfig {
        self.config
    }

    pub fn mix(&self) -> MixMode {
        self.mix
    }

    pub fn is_animated(&self) -> bool {
        self.config.is_animated()
    }

    /// Move the centre without restarting the mode's clock.
    pub fn set_offset(&mut self, offset: f32) {
        self.config.offset = clamp_pan(offset);
    }

    /// Left/right positions at audio time `now`.
    pub fn positions(&self, now: f64, breath: BreathSample) -> (f32, f32) {
        if !self.is_animated() {
            return static_positions(self.mix, self.config.offset);
        }
        let PanConfig {
            mode,
            depth,
            offset,
        } = self.config;
        let t = (now - self.started).max(0.0);
        let dichotic = self.mix == MixMode::Dichotic;
        let place = |x: f32| clamp_pan(offset + depth * x);

        match mode {
            PanMode::Static => static_positions(self.mix, offset),
            PanMode::SineLfo { frequency, phase } => {
                let left = place(sine_at(t, frequency, phase));
                if dichotic {
                    (left, place(sine_at(t, frequency, phase + FRAC_PI_2)))
                } else {
                    (left, left)
                }
            }
            PanMode::BreathingSync => {
                let left = place(breath.value);
                if dichotic {
                    (left, place(breath.quarter_ahead))
                } else {
                    (left, left)
                }
            }
            PanMode::Crossfade {
                hold_secs,
                fade_secs,
            } => {
                let x = crossfade_position(t, hold_secs as f64, fade_secs as f64);
                let left = place(x);
                if dichotic {
                    (left, place(-x))
                } else {
                    (left, left)
                }
            }
        }
    }
}

/// Unit crossfade in [-1, 1]: even cycles go -1 → +1, odd cycles back.
pub fn crossfade_position(t: f64, hold: f64, fade: f64) -> f32 {
    let cycle = hold + fade;
    if cycle <= 0.0 {
        return -1.0;
    }
    let index = (t / cycle).floor();
    let within = t - index * cycle;
    let progress = if within < hold || fade <= 0.0 {
        0.0
    } else {
        ((within - hold) / fade).clamp(0.0, 1.0)
    };
    let rising = -1.0 + 2.0 * progress;
    if index as u64 % 2 == 0 {
        rising as f32
    } else {
        -rising as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_range((l, r): (f32, f32)) -> bool {
        (-1.0..=1.0).contains(&l) && (-1.0..=1.0).contains(&r)
    }

    #[test]
    fn static_positions_follow_mix_mode() {
        assert_eq!(static_positions(MixMode::Dichotic, 0.0), (-1.0, 1.0));
        assert_eq!(static_positions(MixMode::Dichotic, 0.5), (-0.5, 1.0));
        assert_eq!(static_positions(MixMode::Monaural, 0.3), (0.3, 0.3));
    }

    #[test]
    fn zero_depth_resolves_to_static() {
        let config = PanConfig {
            mode: PanMode::SineLfo {
                frequency: 1.0,
                phase: 0.0,
            },
            depth: 0.0,
            offset: 0.0,
        };
        let pan = PanAutomation::new(config, MixMode::Dichotic, 0.0);
        assert!(!pan.is_animated());
        assert_eq!(pan.positions(0.37, BreathSample::default()), (-1.0, 1.0));
    }

    #[test]
    fn sine_right_leads_by_quarter_cycle() {
        let config = PanConfig::with_mode(PanMode::SineLfo {
            frequency: 0.25,
            phase: 0.0,
        });
        let pan = PanAutomation::new(config, MixMode::Dichotic, 10.0);
        let (l, r) = pan.positions(10.0, BreathSample::default());
        assert!(l.abs() < 1e-6);
        assert!((r - 1.0).abs() < 1e-6);

        let mono = PanAutomation::new(config, MixMode::Monaural, 10.0);
        let (l, r) = mono.positions(11.0, BreathSample::default());
        assert_eq!(l, r);
        assert!((l - 1.0).abs() < 1e-6);
    }

    #[test]
    fn breathing_sync_follows_breath() {
        let config = PanConfig {
            mode: PanMode::BreathingSync,
            depth: 0.5,
            offset: 0.2,
        };
        let pan = PanAutomation::new(config, MixMode::Dichotic, 0.0);
        let breath = BreathSample {
            value: 1.0,
            quarter_ahead: -1.0,
        };
        let (l, r) = pan.positions(3.0, breath);
        assert!((l - 0.7).abs() < 1e-6);
        assert!((r + 0.3).abs() < 1e-6);
    }

    #[test]
    fn crossfade_flips_direction_each_cycle() {
        // hold 1 s, fade 1 s: cycle 0 rises, cycle 1 falls.
        assert_eq!(crossfade_position(0.5, 1.0, 1.0), -1.0);
        assert!((crossfade_position(1.5, 1.0, 1.0) - 0.0).abs() < 1e-6);
        assert_eq!(crossfade_position(1.999_999, 1.0, 1.0).round(), 1.0);
        assert_eq!(crossfade_position(2.0, 1.0, 1.0), 1.0);
        assert_eq!(crossfade_position(2.5, 1.0, 1.0), 1.0);
        assert!((crossfade_position(3.5, 1.0, 1.0) - 0.0).abs() < 1e-6);
        assert_eq!(crossfade_position(4.0, 1.0, 1.0), -1.0);
    }

    #[test]
    fn crossfade_mirrors_around_offset() {
        let config = PanConfig {
            mode: PanMode::Crossfade {
                hold_secs: 1.0,
                fade_secs: 1.0,
            },
            depth: 0.5,
            offset: 0.5,
        };
        let pan = PanAutomation::new(config, MixMode::Dichotic, 0.0);
        // Holding at the start of a rising cycle.
        assert_eq!(pan.positions(0.5, BreathSample::default()), (0.0, 1.0));
        // Mid fade both tones meet at the offset.
        let (l, r) = pan.positions(1.5, BreathSample::default());
        assert!((l - 0.5).abs() < 1e-6 && (r - 0.5).abs() < 1e-6);
        assert_eq!(pan.positions(2.5, BreathSample::default()), (1.0, 0.0));
    }

    #[test]
    fn every_mode_stays_in_range() {
        let modes = [
            PanMode::Static,
            PanMode::SineLfo {
                frequency: 3.0,
                phase: 1.0,
            },
            PanMode::BreathingSync,
            PanMode::Crossfade {
                hold_secs: 0.5,
                fade_secs: 0.25,
            },
        ];
        for mode in modes {
            for mix in [MixMode::Dichotic, MixMode::Monaural] {
                let config = PanConfig {
                    mode,
                    depth: 1.0,
                    offset: 0.8,
                };
                let pan = PanAutomation::new(config, mix, 0.0);
                for step in 0..400 {
                    let t = step as f64 * 0.0125;
                    let breath = BreathSample {
                        value: (t * 2.0).sin() as f32,
                        quarter_ahead: (t * 2.0).cos() as f32,
                    };
                    assert!(in_range(pan.positions(t, breath)), "{mode:?} at {t}");
                }
            }
        }
    }
}
