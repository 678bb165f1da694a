//! Breathing modulation descriptors and the render-side registry table.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::modulate::clamped_modulation;
use crate::synth::message::TrackId;
use crate::{MAX_MOD_PARAMS, MAX_MOD_TRACKS};

/// Track parameters that can follow the breathing signal.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ModParam {
    #[default]
    Gain,
    /// Main frequency. On beat tracks this moves the carrier.
    Frequency,
    /// Carrier of a beat pair.
    Base,
    /// Beat frequency of a beat pair.
    Beat,
    PulseRate,
    Pan,
}

impl ModParam {
    pub fn name(self) -> &'static str {
        match self {
            ModParam::Gain => "gain",
            ModParam::Frequency => "frequency",
            ModParam::Base => "base",
            ModParam::Beat => "beat",
            ModParam::PulseRate => "pulse_rate",
            ModParam::Pan => "pan",
        }
    }
}

/// `value = clamp(base + depth × signal, min, max)` for one parameter.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct ModulationParam {
    pub param: ModParam,
    pub base: f32,
    pub depth: f32,
    pub min: f32,
    pub max: f32,
}

impl ModulationParam {
    /// Non-finite base or depth become zero; a NaN bound leaves that side open.
    pub fn new(param: ModParam, base: f32, depth: f32, min: f32, max: f32) -> Self {
        Self {
            param,
            base,
            depth,
            min,
            max,
        }
        .sanitized()
    }

    pub fn sanitized(self) -> Self {
        let finite = |v: f32| if v.is_finite() { v } else { 0.0 };
        let bound = |v: f32, open: f32| if v.is_nan() { open } else { v.clamp(f32::MIN, f32::MAX) };
        Self {
            param: self.param,
            base: finite(self.base),
            depth: finite(self.depth),
            min: bound(self.min, f32::MIN),
            max: bound(self.max, f32::MAX),
        }
    }

    #[inline]
    pub fn value_at(&self, signal: f32) -> f32 {
        clamped_modulation(self.base, signal.clamp(-1.0, 1.0), self.depth, self.min, self.max)
    }
}

/// One track's descriptors in a fixed-size, copyable form.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModTarget {
    pub track: TrackId,
    params: [ModulationParam; MAX_MOD_PARAMS],
    len: usize,
}

impl ModTarget {
    /// Descriptors beyond [`MAX_MOD_PARAMS`] are dropped.
    pub fn new(track: TrackId, params: &[ModulationParam]) -> Self {
        let mut fixed = [ModulationParam::default(); MAX_MOD_PARAMS];
        let len = params.len().min(MAX_MOD_PARAMS);
        for (slot, param) in fixed.iter_mut().zip(params) {
            *slot = param.sanitized();
        }
        Self {
            track,
            params: fixed,
            len,
        }
    }

    pub fn params(&self) -> &[ModulationParam] {
        &self.params[..self.len]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct ModulatedValue {
    pub track: TrackId,
    pub param: ModParam,
    pub value: f32,
}

const MAX_VALUES: usize = MAX_MOD_TRACKS * MAX_MOD_PARAMS;

/// Every modulated value computed at one snapshot.
#[derive(Clone, Copy, Debug)]
pub struct ModulatedValues {
    entries: [ModulatedValue; MAX_VALUES],
    len: usize,
}

impl ModulatedValues {
    pub fn empty() -> Self {
        Self {
            entries: [ModulatedValue::default(); MAX_VALUES],
            len: 0,
        }
    }

    fn push(&mut self, value: ModulatedValue) {
        if self.len < MAX_VALUES {
            self.entries[self.len] = value;
            self.len += 1;
        }
    }

    pub fn as_slice(&self) -> &[ModulatedValue] {
        &self.entries[..self.len]
    }

    pub fn for_track(&self, track: TrackId) -> impl Iterator<Item = &ModulatedValue> {
        self.as_slice().iter().filter(move |entry| entry.track == track)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for ModulatedValues {
    fn default() -> Self {
        Self::empty()
    }
}

/// Registry of modulation targets living on the render thread.
pub struct ModTable {
    targets: [Option<ModTarget>; MAX_MOD_TRACKS],
}

impl ModTable {
    pub fn new() -> Self {
        Self {
            targets: [None; MAX_MOD_TRACKS],
        }
    }

    /// Insert or replace the target for its track. False when the table is full.
    pub fn register(&mut self, target: ModTarget) -> bool {
        if let Some(existing) = self
            .targets
            .iter_mut()
            .flatten()
            .find(|existing| existing.track == target.track)
        {
            *existing = target;
            return true;
        }
        match self.targets.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(target);
                true
            }
            None => false,
        }
    }

    pub fn unregister(&mut self, track: TrackId) {
        for slot in self.targets.iter_mut() {
            if slot.is_some_and(|target| target.track == track) {
                *slot = None;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.targets.iter().all(Option::is_none)
    }

    pub fn evaluate(&self, signal: f32) -> ModulatedValues {
        let mut values = ModulatedValues::empty();
        for target in self.targets.iter().flatten() {
            for param in target.params() {
                values.push(ModulatedValue {
                    track: target.track,
                    param: param.param,
                    value: param.value_at(signal),
                });
            }
        }
        values
    }
}

impl Default for ModTable {
    fn default() -> Self {
        Self::new()
    }
}
