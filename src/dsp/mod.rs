//! Low-level DSP primitives used by the graph nodes and voices.
//!
//! These components are allocation-free and realtime-safe, making them safe to
//! embed directly inside voice structs. They stay focused on the
//! signal-processing math so the engine can layer orchestration on top.

/// Breathing waveform shaping and period trajectories.
pub mod breath;
/// Attack/hold/release strike envelope.
pub mod envelope;
/// Bipolar/unipolar helpers and sine LFO evaluation.
pub mod lfo;
/// Windowed RMS and peak metering.
pub mod meter;
/// Clamped base + depth × signal modulation.
pub mod modulate;
/// White, pink and brown noise.
pub mod noise;
/// Oscillator waveforms.
pub mod oscillator;
/// Equal-power pan law.
pub mod pan;
/// Linear ramps and exponential smoothing for live parameters.
pub mod smooth;

pub use envelope::EnvelopeState;
pub use smooth::{SmoothedValue, Smoothing};
