//! Composable building blocks for the per-track signal paths.
//!
//! Graph nodes wrap the low-level DSP primitives with what a live track needs:
//! block rendering, smoothed parameters and a few combinators. The
//! `extensions` module adds fluent helpers so voices can be assembled with a
//! clear, chainable API (`carrier.amplify(gate)`, `left.mix(right, 0.5)`).

/// Multiply two signals together (gating or ring modulation).
pub mod amplify;
/// Fluent combinators (`.amplify()`, `.mix()`).
pub mod extensions;
/// Breathing oscillator and its published snapshot.
pub mod martigli;
/// Linear mixing of two graphs (monaural summing).
pub mod mix;
/// Core traits shared by all graph nodes.
pub mod node;
/// Noise beds.
pub mod noise;
/// Audio-band oscillators with smoothed frequency.
pub mod oscillator;
/// Mono to stereo placement with a smoothed position.
pub mod panner;
/// Isochronic pulse gate.
pub mod pulse;

pub use extensions::NodeExt;
pub use martigli::{BreathSnapshot, BreathingOscillator};
pub use node::{GraphNode, Modulatable, RenderCtx};
