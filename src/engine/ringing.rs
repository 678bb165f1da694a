//! Change-ringing schedules and how they become bell strikes.
//!
//! A schedule is produced elsewhere (a method library, or the peal adapter
//! in [`crate::engine::peal`]) and consumed read-only here. Planning is pure:
//! it resolves every audible event to a level, position and pitch, and the
//! engine turns the plan into one ensemble voice.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::envelope::StrikeTiming;
use crate::dsp::lfo::Vibrato;
use crate::dsp::oscillator::OscillatorWaveform;
use crate::dsp::pan::clamp_pan;
use crate::voices::Strike;

/// One bell strike in a schedule.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrikeEvent {
    /// Seconds from the start of the schedule.
    pub time: f64,
    /// Zero-based bell index.
    pub bell: usize,
    pub frequency: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_row_lead: bool,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct RingingSchedule {
    /// Number of bells. Zero means "derive from the events".
    pub stage: usize,
    pub events: Vec<StrikeEvent>,
    /// Seconds from strike to the start of the release.
    pub strike_duration: f32,
    pub attack: f32,
    pub release: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub metadata: BTreeMap<String, String>,
}

impl RingingSchedule {
    /// Declared stage, or the highest bell index + 1 when undeclared.
    pub fn effective_stage(&self) -> usize {
        if self.stage > 0 {
            return self.stage;
        }
        self.events
            .iter()
            .map(|event| event.bell + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn timing(&self) -> StrikeTiming {
        StrikeTiming::new(self.attack, self.strike_duration, self.release)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Parse a schedule exported by a method library.
    #[cfg(feature = "serde")]
    pub fn from_json_str(source: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    #[cfg(feature = "serde")]
    pub fn to_json_string(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Which strikes get the accent multiplier.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccentMode {
    None,
    /// The first strike of every row.
    #[default]
    RowLead,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub gain: f32,
    pub accent_mode: AccentMode,
    pub accent_gain: f32,
    /// Per-bell level multipliers by bell index; missing entries are 1.
    pub per_bell_gain: Vec<f32>,
    /// Bells are spread evenly across [-pan_spread, pan_spread].
    pub pan_spread: f32,
    /// Cents of detune per bell away from the centre bell.
    pub detune_cents: f32,
    pub waveform: OscillatorWaveform,
    /// Applied to every strike from its own onset.
    pub vibrato: Vibrato,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            gain: 0.18,
            accent_mode: AccentMode::RowLead,
            accent_gain: 1.3,
            per_bell_gain: Vec::new(),
            pan_spread: 0.6,
            detune_cents: 0.0,
            waveform: OscillatorWaveform::Sine,
            vibrato: Vibrato::default(),
        }
    }
}

/// Level shared by every strike before accents: louder stages are scaled
/// down so the ensemble keeps roughly the same loudness.
pub fn base_level(gain: f32, stage: usize) -> f32 {
    if stage == 0 {
        return 0.0;
    }
    gain.max(0.0) / (stage as f32).sqrt()
}

/// Position of `bell` in an even spread over [-spread, spread].
pub fn bell_pan(bell: usize, stage: usize, spread: f32) -> f32 {
    if stage <= 1 {
        return 0.0;
    }
    let spread = clamp_pan(spread.abs());
    let unit = bell as f32 / (stage - 1) as f32;
    clamp_pan(-spread + 2.0 * spread * unit)
}

/// Detune of `bell` in cents, proportional to its distance from the centre.
pub fn bell_detune_cents(bell: usize, stage: usize, detune_cents: f32) -> f32 {
    if stage <= 1 || !detune_cents.is_finite() {
        return 0.0;
    }
    let center = (stage - 1) as f32 / 2.0;
    detune_cents * (bell as f32 - center)
}

/// A resolved, audible strike.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedStrike {
    pub time: f64,
    pub bell: usize,
    pub frequency: f32,
    pub level: f32,
    pub pan: f32,
    pub vibrato: Vibrato,
}

impl PlannedStrike {
    pub(crate) fn to_strike(self, sample_rate: f32, timing: StrikeTiming) -> Strike {
        Strike {
            start_frame: (self.time.max(0.0) * sample_rate as f64).round() as u64,
            frequency: self.frequency,
            level: self.level,
            pan: self.pan,
            timing,
            vibrato: self.vibrato,
        }
    }
}

/// Resolve every event to level, pan and pitch. Muted events are dropped.
pub fn plan_strikes(schedule: &RingingSchedule, options: &RenderOptions) -> Vec<PlannedStrike> {
    let stage = schedule.effective_stage();
    let base = base_level(options.gain, stage);
    let vibrato = Vibrato::new(options.vibrato.rate_hz, options.vibrato.depth);

    schedule
        .events
        .iter()
        .filter_map(|event| {
            let accent = match options.accent_mode {
                AccentMode::RowLead if event.is_row_lead => options.accent_gain,
                _ => 1.0,
            };
            let per_bell = options.per_bell_gain.get(event.bell).copied().unwrap_or(1.0);
            let level = (base * accent * per_bell).min(1.0);
            if level.is_nan() || level <= 0.0 || !event.frequency.is_finite() || event.frequency <= 0.0 {
                return None;
            }
            let cents = bell_detune_cents(event.bell, stage, options.detune_cents);
            Some(PlannedStrike {
                time: event.time,
                bell: event.bell,
                frequency: event.frequency * 2f32.powf(cents / 1200.0),
                level,
                pan: bell_pan(event.bell, stage, options.pan_spread),
                vibrato,
            })
        })
        .collect()
}

/// Time at which the last planned strike has fully released.
pub fn finish_time(strikes: &[PlannedStrike], timing: StrikeTiming) -> f64 {
    strikes
        .iter()
        .map(|strike| strike.time + timing.total() as f64)
        .fold(0.0, f64::max)
}

/// Seconds until `schedule` has rung out under `options`, whatever order
/// its events are listed in.
pub fn ringing_length(schedule: &RingingSchedule, options: &RenderOptions) -> f64 {
    finish_time(&plan_strikes(schedule, options), schedule.timing())
}
