//! Control-side handle on the shared breathing signal.

use std::collections::VecDeque;

use rtrb::{Producer, PushError};
use tracing::debug;

use crate::config::BreathConfig;
use crate::dsp::breath::{clamp_inhale_ratio, shape_value, BreathShape, Trajectory};
use crate::engine::pan::BreathSample;
use crate::graph::{BreathSnapshot, BreathingOscillator};
use crate::synth::message::BreathCommand;

enum Source {
    /// The render thread owns the oscillator; we mirror its snapshots.
    Realtime {
        commands: Producer<BreathCommand>,
        /// Commands that found the ring full, replayed on the next tick.
        pending: VecDeque<BreathCommand>,
        latest: BreathSnapshot,
    },
    /// The control thread owns the oscillator and advances it on every tick.
    Local {
        osc: BreathingOscillator,
        sample_rate: f32,
        /// Audio time the oscillator has been advanced to.
        clock: f64,
    },
}

/// The single breathing clock every modulated parameter and pan follows.
///
/// Passed explicitly to whatever needs the breathing value; whichever
/// thread actually runs the oscillator, readers see the same interface.
pub struct BreathingHandle {
    source: Source,
    shape: BreathShape,
    inhale_ratio: f32,
}

impl BreathingHandle {
    pub(crate) fn realtime(config: &BreathConfig, commands: Producer<BreathCommand>) -> Self {
        Self {
            source: Source::Realtime {
                commands,
                pending: VecDeque::new(),
                latest: BreathSnapshot::default(),
            },
            shape: config.shape,
            inhale_ratio: clamp_inhale_ratio(config.inhale_ratio),
        }
    }

    pub(crate) fn local(config: &BreathConfig, sample_rate: f32, now: f64) -> Self {
        Self {
            source: Source::Local {
                osc: oscillator(config),
                sample_rate,
                clock: now,
            },
            shape: config.shape,
            inhale_ratio: clamp_inhale_ratio(config.inhale_ratio),
        }
    }

    /// Take over the oscillator locally, continuing from the last snapshot.
    pub(crate) fn fall_back(&mut self, config: &BreathConfig, sample_rate: f32, now: f64) {
        let Source::Realtime { latest, .. } = &self.source else {
            return;
        };
        let mut osc = oscillator(config);
        osc.advance(latest.elapsed_samples as f64 / sample_rate as f64, sample_rate);
        self.source = Source::Local {
            osc,
            sample_rate,
            clock: now,
        };
    }

    pub fn is_realtime(&self) -> bool {
        matches!(self.source, Source::Realtime { .. })
    }

    pub fn configure(&mut self, config: &BreathConfig) {
        self.shape = config.shape;
        self.inhale_ratio = clamp_inhale_ratio(config.inhale_ratio);
        let trajectory = Trajectory::from_points(&config.trajectory);
        if let Source::Local { osc, .. } = &mut self.source {
            osc.configure(config.shape, config.inhale_ratio, trajectory, config.period);
            return;
        }
        self.send(BreathCommand::Configure {
            shape: config.shape,
            inhale_ratio: config.inhale_ratio,
            trajectory,
            period: config.period,
        });
    }

    /// Phase and elapsed time back to zero.
    pub fn reset(&mut self) {
        self.send(BreathCommand::Reset);
    }

    pub fn stop(&mut self) {
        self.send(BreathCommand::Stop);
    }

    fn send(&mut self, command: BreathCommand) {
        match &mut self.source {
            Source::Realtime {
                commands,
                pending,
                latest,
            } => {
                if !matches!(command, BreathCommand::Configure { .. }) {
                    *latest = BreathSnapshot::default();
                }
                if !flush(commands, pending) {
                    defer(pending, command);
                    return;
                }
                if let Err(PushError::Full(command)) = commands.push(command) {
                    debug!(?command, "breathing command ring full, deferring");
                    defer(pending, command);
                }
            }
            Source::Local { osc, .. } => osc.reset(),
        }
    }

    /// Replay deferred commands. Returns false while some are still waiting.
    pub(crate) fn flush(&mut self) -> bool {
        match &mut self.source {
            Source::Realtime {
                commands, pending, ..
            } => flush(commands, pending),
            Source::Local { .. } => true,
        }
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        match &self.source {
            Source::Realtime { pending, .. } => pending.len(),
            Source::Local { .. } => 0,
        }
    }

    /// Record a snapshot published by the render thread.
    pub(crate) fn observe(&mut self, snapshot: BreathSnapshot) {
        if let Source::Realtime { latest, .. } = &mut self.source {
            *latest = snapshot;
        }
    }

    /// Advance the local oscillator to audio time `now`.
    pub(crate) fn advance_to(&mut self, now: f64) {
        if let Source::Local {
            osc,
            sample_rate,
            clock,
        } = &mut self.source
        {
            if now > *clock {
                osc.advance(now - *clock, *sample_rate);
                *clock = now;
            }
        }
    }

    /// Current breathing value in [-1, 1].
    pub fn value(&self) -> f32 {
        self.snapshot().value
    }

    pub fn snapshot(&self) -> BreathSnapshot {
        match &self.source {
            Source::Realtime { latest, .. } => *latest,
            Source::Local { osc, .. } => osc.snapshot(),
        }
    }

    /// Value a quarter cycle ahead of the current one.
    pub fn quarter_ahead(&self) -> f32 {
        shape_value(self.snapshot().phase + 0.25, self.inhale_ratio, self.shape)
    }

    pub fn sample(&self) -> BreathSample {
        BreathSample {
            value: self.value(),
            quarter_ahead: self.quarter_ahead(),
        }
    }
}

fn flush(commands: &mut Producer<BreathCommand>, pending: &mut VecDeque<BreathCommand>) -> bool {
    while let Some(command) = pending.pop_front() {
        if let Err(PushError::Full(command)) = commands.push(command) {
            pending.push_front(command);
            return false;
        }
    }
    true
}

/// Queue `command` behind the ring. Only the latest configuration matters,
/// and back-to-back resets collapse into one.
fn defer(pending: &mut VecDeque<BreathCommand>, command: BreathCommand) {
    match command {
        BreathCommand::Configure { .. } => {
            pending.retain(|queued| !matches!(queued, BreathCommand::Configure { .. }));
        }
        BreathCommand::Reset | BreathCommand::Stop => {
            if matches!(pending.back(), Some(BreathCommand::Reset | BreathCommand::Stop)) {
                pending.pop_back();
            }
        }
    }
    pending.push_back(command);
}

pub(crate) fn oscillator(config: &BreathConfig) -> BreathingOscillator {
    BreathingOscillator::new(
        config.shape,
        config.inhale_ratio,
        Trajectory::from_points(&config.trajectory),
        config.period,
    )
}
