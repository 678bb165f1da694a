use std::collections::HashMap;

use crate::synth::TrackId;

/// Per-track timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackTimer {
    /// Finite duration or ringing teardown reached.
    Expire,
    /// Pan automation tick.
    Pan,
}

/// Engine-wide timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EngineTimer {
    ModulationPoll,
    SafetyCheck,
    /// Stop everything once the duration-limit fade has finished.
    ForcedStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKey {
    Track(TrackId, TrackTimer),
    Engine(EngineTimer),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Timer {
    deadline: f64,
    period: Option<f64>,
}

/// Deadline table keyed by owner, driven by the audio clock.
///
/// One entry per key: scheduling again replaces the previous deadline, and
/// cancelling is a single map removal.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: HashMap<TimerKey, Timer>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-shot timer at `deadline` seconds of audio time.
    pub fn schedule_at(&mut self, key: TimerKey, deadline: f64) {
        self.timers.insert(
            key,
            Timer {
                deadline,
                period: None,
            },
        );
    }

    /// Repeating timer, first firing one period from `now`.
    pub fn schedule_every(&mut self, key: TimerKey, now: f64, period: f64) {
        let period = period.max(1e-3);
        self.timers.insert(
            key,
            Timer {
                deadline: now + period,
                period: Some(period),
            },
        );
    }

    /// Returns whether the key was scheduled.
    pub fn cancel(&mut self, key: TimerKey) -> bool {
        self.timers.remove(&key).is_some()
    }

    /// Drop every timer owned by `track`.
    pub fn cancel_track(&mut self, track: TrackId) {
        self.timers
            .retain(|key, _| !matches!(key, TimerKey::Track(id, _) if *id == track));
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn is_scheduled(&self, key: TimerKey) -> bool {
        self.timers.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Keys due at `now`, in deadline order. One-shot timers are removed,
    /// repeating timers are re-armed past `now` (missed periods are skipped).
    pub fn due(&mut self, now: f64) -> Vec<TimerKey> {
        let mut fired: Vec<(f64, TimerKey)> = Vec::new();
        self.timers.retain(|key, timer| {
            if timer.deadline > now {
                return true;
            }
            fired.push((timer.deadline, *key));
            match timer.period {
                Some(period) => {
                    let missed = ((now - timer.deadline) / period).floor() + 1.0;
                    timer.deadline += missed * period;
                    true
                }
                None => false,
            }
        });
        fired.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        fired.into_iter().map(|(_, key)| key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPIRE: TimerKey = TimerKey::Track(TrackId(1), TrackTimer::Expire);
    const PAN: TimerKey = TimerKey::Track(TrackId(1), TrackTimer::Pan);
    const POLL: TimerKey = TimerKey::Engine(EngineTimer::ModulationPoll);

    #[test]
    fn one_shot_fires_once() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(EXPIRE, 1.0);
        assert!(scheduler.due(0.5).is_empty());
        assert_eq!(scheduler.due(1.0), vec![EXPIRE]);
        assert!(scheduler.due(2.0).is_empty());
    }

    #[test]
    fn repeating_skips_missed_periods() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_every(POLL, 0.0, 0.05);
        // A long stall fires once, not once per missed period.
        assert_eq!(scheduler.due(1.0), vec![POLL]);
        assert!(scheduler.due(1.02).is_empty());
        assert_eq!(scheduler.due(1.06), vec![POLL]);
    }

    #[test]
    fn cancel_track_leaves_engine_timers() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(EXPIRE, 1.0);
        scheduler.schedule_every(PAN, 0.0, 0.03);
        scheduler.schedule_every(POLL, 0.0, 0.05);

        scheduler.cancel_track(TrackId(1));
        assert!(!scheduler.is_scheduled(EXPIRE));
        assert!(!scheduler.is_scheduled(PAN));
        assert!(scheduler.is_scheduled(POLL));
        assert!(!scheduler.cancel(EXPIRE));
    }

    #[test]
    fn due_is_in_deadline_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(EXPIRE, 0.2);
        scheduler.schedule_at(POLL, 0.1);
        assert_eq!(scheduler.due(1.0), vec![POLL, EXPIRE]);
    }
}
