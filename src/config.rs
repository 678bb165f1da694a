#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::breath::{BreathShape, TrajectoryPoint};

/// Top-level engine configuration.
///
/// Every perceptual tuning constant lives here so products can retune them
/// without touching the engine. Defaults match the reference presets.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Sample rate used for offline rendering and as a hint for live output.
    pub sample_rate: u32,
    /// Block size used by offline rendering loops.
    pub block_size: usize,
    /// Linear fade applied when a track starts (seconds).
    pub fade_in_secs: f32,
    /// Linear fade applied when a track is stopped (seconds).
    pub stop_fade_secs: f32,
    /// Initial master gain.
    pub master_gain: f32,
    /// Delay after the last strike release before an ensemble is torn down.
    pub ringing_teardown_secs: f32,
    /// Capacity of the control-to-render command ring.
    pub command_capacity: usize,
    /// Capacity of the render-to-control telemetry ring.
    pub telemetry_capacity: usize,
    pub modulation: ModulationConfig,
    pub pan: PanTimingConfig,
    pub breathing: BreathConfig,
    pub safety: SafetyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 512,
            fade_in_secs: 0.05,
            stop_fade_secs: 0.05,
            master_gain: 1.0,
            ringing_teardown_secs: 0.25,
            command_capacity: 1024,
            telemetry_capacity: 256,
            modulation: ModulationConfig::default(),
            pan: PanTimingConfig::default(),
            breathing: BreathConfig::default(),
            safety: SafetyConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    #[cfg(feature = "serde")]
    pub fn from_toml_str(source: &str) -> crate::Result<Self> {
        Ok(toml::from_str(source)?)
    }

    #[cfg(feature = "serde")]
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

/// Breathing-driven modulation settings.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct ModulationConfig {
    /// Prefer the sample-accurate path on the render thread.
    pub realtime: bool,
    /// Control-thread poll interval for modulated values (seconds).
    pub poll_interval_secs: f32,
    /// Exponential smoothing time constant applied to live parameters.
    pub smoothing_secs: f32,
    /// Rate at which the render thread publishes snapshots.
    pub snapshot_rate_hz: f32,
}

impl Default for ModulationConfig {
    fn default() -> Self {
        Self {
            realtime: true,
            poll_interval_secs: 0.05,
            smoothing_secs: 0.02,
            snapshot_rate_hz: 60.0,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct PanTimingConfig {
    /// Control-thread cadence of pan automation (seconds).
    pub interval_secs: f32,
    /// Smoothing applied to each new pan position (seconds).
    pub smoothing_secs: f32,
}

impl Default for PanTimingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 0.03,
            smoothing_secs: 0.02,
        }
    }
}

/// Shape and pacing of the breathing signal.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct BreathConfig {
    /// Period used when the trajectory is empty (seconds).
    pub period: f32,
    pub shape: BreathShape,
    /// Fraction of the cycle spent rising. Clamped to [0.05, 0.95].
    pub inhale_ratio: f32,
    pub trajectory: Vec<TrajectoryPoint>,
}

impl Default for BreathConfig {
    fn default() -> Self {
        Self {
            period: 10.0,
            shape: BreathShape::Sine,
            inhale_ratio: 0.5,
            trajectory: Vec::new(),
        }
    }
}

/// Listening-safety limits.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyConfig {
    /// RMS (full scale) above which a rate-limited warning is raised.
    pub volume_warning: f32,
    /// RMS (full scale) above which an immediate emergency is raised.
    pub volume_emergency: f32,
    /// Session length that raises a duration warning (seconds).
    pub duration_warning_secs: f64,
    /// Session length that forces playback to stop (seconds).
    pub duration_limit_secs: f64,
    /// Minimum spacing between non-emergency warnings (seconds).
    pub warning_cooldown_secs: f64,
    /// Amplitude sampling cadence (seconds).
    pub check_interval_secs: f32,
    /// Fraction of master gain removed on a volume emergency.
    pub emergency_gain_reduction: f32,
    pub emergency_ramp_secs: f32,
    /// Fade to silence before the forced stop at the duration limit.
    pub shutdown_fade_secs: f32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            volume_warning: 0.8,
            volume_emergency: 0.95,
            duration_warning_secs: 45.0 * 60.0,
            duration_limit_secs: 60.0 * 60.0,
            warning_cooldown_secs: 5.0 * 60.0,
            check_interval_secs: 0.1,
            emergency_gain_reduction: 0.3,
            emergency_ramp_secs: 0.5,
            shutdown_fade_secs: 2.0,
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            fade_in_secs = 0.02

            [safety]
            duration_limit_secs = 1800.0

            [breathing]
            shape = "Triangle"
            trajectory = [{ period = 6.0, duration = 0.0 }, { period = 12.0, duration = 300.0 }]
            "#,
        )
        .unwrap();

        assert_eq!(config.fade_in_secs, 0.02);
        assert_eq!(config.safety.duration_limit_secs, 1800.0);
        assert_eq!(config.safety.volume_warning, 0.8);
        assert_eq!(config.breathing.shape, BreathShape::Triangle);
        assert_eq!(config.breathing.trajectory.len(), 2);
        assert_eq!(config.modulation, ModulationConfig::default());
    }
}
