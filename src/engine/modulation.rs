//! Breathing modulation as seen from the control thread.
//!
//! Two interchangeable backends sit behind [`ModulationChannel`]:
//!
//! - [`RealtimeChannel`] forwards registrations to the render thread, which
//!   evaluates every descriptor against the sample-accurate breathing value
//!   and sends the results back with each snapshot.
//! - [`PollingChannel`] keeps registrations local and evaluates them on the
//!   control thread from the breathing handle's current value.
//!
//! Both apply the same `clamp(base + depth × signal, min, max)` and expose
//! the same cached values, so the engine never branches on which is active.

use std::collections::{BTreeMap, VecDeque};

use rtrb::{Producer, PushError};
use tracing::{debug, warn};

use crate::graph::BreathSnapshot;
use crate::synth::message::{ModCommand, TrackId};
use crate::synth::modulation::{ModParam, ModTarget, ModulatedValues, ModulationParam};
use crate::{MAX_MOD_PARAMS, MAX_MOD_TRACKS};

pub trait ModulationChannel: Send {
    /// Register or replace the descriptors of `track`. Returns false when the
    /// registry is full.
    fn register(&mut self, track: TrackId, params: &[ModulationParam]) -> bool;

    /// Replace the descriptors of an already registered track.
    fn update(&mut self, track: TrackId, params: &[ModulationParam]) -> bool {
        if !self.is_registered(track) {
            return false;
        }
        self.register(track, params)
    }

    /// Returns false if the track was not registered.
    fn unregister(&mut self, track: TrackId) -> bool;

    fn is_registered(&self, track: TrackId) -> bool;

    /// Refresh cached values from the latest breathing state.
    fn observe(&mut self, breath: &BreathSnapshot, values: Option<&ModulatedValues>);

    /// Latest modulated value of every registered parameter of `track`.
    fn modulated_values(&self, track: TrackId) -> Option<BTreeMap<ModParam, f32>>;

    fn is_realtime(&self) -> bool;

    fn registrations(&self) -> Vec<(TrackId, Vec<ModulationParam>)>;

    /// Deliver anything still waiting for the render thread. Returns false
    /// while commands remain queued.
    fn flush(&mut self) -> bool {
        true
    }
}

/// Registrations and cached values shared by both backends.
#[derive(Debug, Default)]
struct Registry {
    targets: BTreeMap<TrackId, Vec<ModulationParam>>,
    values: BTreeMap<TrackId, BTreeMap<ModParam, f32>>,
    last_signal: f32,
}

impl Registry {
    fn can_insert(&self, track: TrackId) -> bool {
        self.targets.contains_key(&track) || self.targets.len() < MAX_MOD_TRACKS
    }

    fn insert(&mut self, track: TrackId, params: &[ModulationParam]) {
        if params.len() > MAX_MOD_PARAMS {
            warn!(%track, count = params.len(), "too many modulated parameters, extra ignored");
        }
        let params: Vec<ModulationParam> = params
            .iter()
            .take(MAX_MOD_PARAMS)
            .map(|param| param.sanitized())
            .collect();
        let values = evaluate(&params, self.last_signal);
        self.targets.insert(track, params);
        self.values.insert(track, values);
    }

    fn remove(&mut self, track: TrackId) -> bool {
        self.values.remove(&track);
        self.targets.remove(&track).is_some()
    }

    fn evaluate_all(&mut self, signal: f32) {
        self.last_signal = signal;
        for (track, params) in &self.targets {
            self.values.insert(*track, evaluate(params, signal));
        }
    }

    fn list(&self) -> Vec<(TrackId, Vec<ModulationParam>)> {
        self.targets
            .iter()
            .map(|(track, params)| (*track, params.clone()))
            .collect()
    }
}

fn evaluate(params: &[ModulationParam], signal: f32) -> BTreeMap<ModParam, f32> {
    params
        .iter()
        .map(|p| (p.param, p.value_at(signal)))
        .collect()
}

/// Evaluation happens on the render thread.
///
/// Registry changes are never dropped: commands that find the ring full wait
/// in `pending` and are replayed in order on the next tick, so the render
/// side table always converges on the control side registry.
pub struct RealtimeChannel {
    commands: Producer<ModCommand>,
    pending: VecDeque<ModCommand>,
    registry: Registry,
}

impl RealtimeChannel {
    pub(crate) fn new(commands: Producer<ModCommand>) -> Self {
        Self {
            commands,
            pending: VecDeque::new(),
            registry: Registry::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.pending.len()
    }

    fn send(&mut self, command: ModCommand) {
        if !self.flush() {
            self.pending.push_back(command);
            return;
        }
        if let Err(PushError::Full(command)) = self.commands.push(command) {
            debug!("modulation ring full, deferring");
            self.pending.push_back(command);
        }
    }

    /// Queued registrations of `track` that the render side has not seen.
    fn forget_pending(&mut self, track: TrackId) {
        self.pending
            .retain(|command| !matches!(command, ModCommand::Register(target) if target.track == track));
    }
}

impl ModulationChannel for RealtimeChannel {
    fn register(&mut self, track: TrackId, params: &[ModulationParam]) -> bool {
        if !self.registry.can_insert(track) {
            warn!(%track, "modulation registry full");
            return false;
        }
        self.forget_pending(track);
        self.send(ModCommand::Register(ModTarget::new(track, params)));
        self.registry.insert(track, params);
        true
    }

    fn unregister(&mut self, track: TrackId) -> bool {
        if !self.registry.remove(track) {
            return false;
        }
        self.forget_pending(track);
        self.send(ModCommand::Unregister(track));
        true
    }

    fn is_registered(&self, track: TrackId) -> bool {
        self.registry.targets.contains_key(&track)
    }

    fn observe(&mut self, breath: &BreathSnapshot, values: Option<&ModulatedValues>) {
        self.registry.last_signal = breath.value;
        let Some(values) = values else {
            return;
        };
        for value in values.as_slice() {
            // Values for tracks unregistered since the snapshot was taken are stale.
            if let Some(cache) = self.registry.values.get_mut(&value.track) {
                cache.insert(value.param, value.value);
            }
        }
    }

    fn modulated_values(&self, track: TrackId) -> Option<BTreeMap<ModParam, f32>> {
        self.registry.values.get(&track).cloned()
    }

    fn is_realtime(&self) -> bool {
        true
    }

    fn registrations(&self) -> Vec<(TrackId, Vec<ModulationParam>)> {
        self.registry.list()
    }

    fn flush(&mut self) -> bool {
        while let Some(command) = self.pending.pop_front() {
            if let Err(PushError::Full(command)) = self.commands.push(command) {
                self.pending.push_front(command);
                return false;
            }
        }
        true
    }
}

/// Evaluation happens on the control thread at poll cadence.
#[derive(Debug, Default)]
pub struct PollingChannel {
    registry: Registry,
}

impl PollingChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModulationChannel for PollingChannel {
    fn register(&mut self, track: TrackId, params: &[ModulationParam]) -> bool {
        if !self.registry.can_insert(track) {
            warn!(%track, "modulation registry full");
            return false;
        }
        self.registry.insert(track, params);
        true
    }

    fn unregister(&mut self, track: TrackId) -> bool {
        self.registry.remove(track)
    }

    fn is_registered(&self, track: TrackId) -> bool {
        self.registry.targets.contains_key(&track)
    }

    fn observe(&mut self, breath: &BreathSnapshot, _values: Option<&ModulatedValues>) {
        self.registry.evaluate_all(breath.value);
    }

    fn modulated_values(&self, track: TrackId) -> Option<BTreeMap<ModParam, f32>> {
        self.registry.values.get(&track).cloned()
    }

    fn is_realtime(&self) -> bool {
        false
    }

    fn registrations(&self) -> Vec<(TrackId, Vec<ModulationParam>)> {
        self.registry.list()
    }
}
