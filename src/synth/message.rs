use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::breath::{BreathShape, Trajectory};
use crate::dsp::Smoothing;
use crate::graph::BreathSnapshot;
use crate::synth::modulation::{ModTarget, ModulatedValues};
use crate::voices::{TrackVoice, VoiceChange, VoiceParam};

/// Identifier handed out by the engine for every started track.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track-{}", self.0)
    }
}

/// Sample-accurate end of a finite track, relative to its first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPlan {
    pub fade_start: u64,
    pub fade_frames: u32,
}

/// Control → render: voices and master bus.
pub enum RenderCommand {
    Add {
        id: TrackId,
        voice: Box<TrackVoice>,
        fade_in_frames: u32,
        stop: Option<StopPlan>,
    },
    Remove {
        id: TrackId,
        fade_frames: u32,
    },
    SetParam {
        id: TrackId,
        param: VoiceParam,
        value: f32,
        smoothing: Smoothing,
    },
    Configure {
        id: TrackId,
        change: VoiceChange,
    },
    MasterGain {
        target: f32,
        ramp_secs: f32,
    },
}

/// Control → render: modulation registry.
#[derive(Debug, Clone, Copy)]
pub enum ModCommand {
    /// Insert, or replace the descriptors of an already registered track.
    Register(ModTarget),
    Unregister(TrackId),
}

/// Control → render: breathing generator.
#[derive(Debug, Clone, Copy)]
pub enum BreathCommand {
    Configure {
        shape: BreathShape,
        inhale_ratio: f32,
        trajectory: Trajectory,
        period: f32,
    },
    Reset,
    Stop,
}

/// Render → control: periodic state.
#[derive(Debug, Clone, Copy)]
pub struct Telemetry {
    /// Frame at which this snapshot was taken.
    pub frame: u64,
    /// None when the renderer runs without a breathing processor.
    pub breath: Option<BreathSnapshot>,
    pub modulated: ModulatedValues,
    pub rms: f32,
    pub peak: f32,
    pub master_gain: f32,
    pub voices: usize,
}

/// Render → control: voices leaving the render thread.
///
/// The boxed voice travels back so it is dropped on the control side.
pub enum RenderEvent {
    /// The voice finished (end of fade or last strike).
    Ended { id: TrackId, voice: Box<TrackVoice> },
    /// No free slot was available.
    Rejected { id: TrackId, voice: Box<TrackVoice> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_id_display() {
        assert_eq!(TrackId(12).to_string(), "track-12");
    }
}
