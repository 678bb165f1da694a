use crate::MIN_TIME;

/*
Strike Envelope
===============

Bell strikes use an attack / hold / release shape with linear ramps:

  Level
    L ┐   ┌────────────┐
      │  ╱              ╲
      │ ╱                ╲
    0 └╱──────────────────╲──→ Time
      |att|     hold       |rel|
      |<-- strike duration ->|

  - attack   ramp 0 → L. Never longer than 90% of the strike duration, so
             every strike reaches its level before it starts to fade.
  - hold     stay at L until the strike duration has elapsed (measured from
             the strike, so the attack is part of the duration).
  - release  ramp L → 0.

Like the ADSR this replaces, the state machine is advanced once per sample
and the ramps are computed from sample counts captured at trigger time, so a
strike always lands exactly on 0.0 at the end of its release.
*/

/// Longest attack allowed, as a fraction of the strike duration.
pub const MAX_ATTACK_FRACTION: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Idle,
    Attack,
    Hold,
    Release,
}

/// Timing of a strike in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrikeTiming {
    pub attack: f32,
    pub duration: f32,
    pub release: f32,
}

impl StrikeTiming {
    /// Clamp to usable values: positive duration, attack within 90% of it.
    pub fn new(attack: f32, duration: f32, release: f32) -> Self {
        let duration = sanitize(duration).max(MIN_TIME);
        let attack = sanitize(attack).min(duration * MAX_ATTACK_FRACTION);
        let release = sanitize(release).max(MIN_TIME);
        Self {
            attack,
            duration,
            release,
        }
    }

    /// Time from the strike until the envelope is back at zero.
    pub fn total(&self) -> f32 {
        self.duration + self.release
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

pub struct Envelope {
    timing: StrikeTiming,
    peak: f32,

    stage: EnvelopeState,
    level: f32,

    attack_samples: u32,
    hold_samples: u32,
    release_samples: u32,
    elapsed: u32,
}

impl Envelope {
    pub fn strike(timing: StrikeTiming, peak: f32) -> Self {
        Self {
            timing,
            peak: peak.clamp(0.0, 1.0),
            stage: EnvelopeState::Idle,
            level: 0.0,
            attack_samples: 1,
            hold_samples: 0,
            release_samples: 1,
            elapsed: 0,
        }
    }

    /// Gate high: start the attack from zero.
    pub fn trigger(&mut self, sample_rate: f32) {
        let attack = (self.timing.attack * sample_rate).round().max(1.0) as u32;
        let total = (self.timing.duration * sample_rate).round().max(1.0) as u32;
        self.attack_samples = attack.min(total);
        self.hold_samples = total - self.attack_samples;
        self.release_samples = (self.timing.release * sample_rate).round().max(1.0) as u32;
        self.elapsed = 0;
        self.level = 0.0;
        self.stage = EnvelopeState::Attack;
    }

    /// Advance by one sample and return the new level.
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            EnvelopeState::Idle => {
                self.level = 0.0;
            }
            EnvelopeState::Attack => {
                self.elapsed += 1;
                self.level = self.peak * (self.elapsed as f32 / self.attack_samples as f32);
                if self.elapsed >= self.attack_samples {
                    self.level = self.peak;
                    self.elapsed = 0;
                    self.stage = if self.hold_samples == 0 {
                        EnvelopeState::Release
                    } else {
                        EnvelopeState::Hold
                    };
                }
            }
            EnvelopeState::Hold => {
                self.level = self.peak;
                self.elapsed += 1;
                if self.elapsed >= self.hold_samples {
                    self.elapsed = 0;
                    self.stage = EnvelopeState::Release;
                }
            }
            EnvelopeState::Release => {
                self.elapsed += 1;
                let progress = self.elapsed as f32 / self.release_samples as f32;
                self.level = (self.peak * (1.0 - progress)).max(0.0);
                if self.elapsed >= self.release_samples {
                    self.level = 0.0;
                    self.stage = EnvelopeState::Idle;
                }
            }
        }

        debug_assert!((0.0..=1.0).contains(&self.level));
        self.level
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.stage, EnvelopeState::Idle)
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn state(&self) -> EnvelopeState {
        self.stage
    }

    pub fn timing(&self) -> StrikeTiming {
        self.timing
    }
}
