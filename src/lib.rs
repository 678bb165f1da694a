pub mod config;
pub mod dsp; // Allocation-free signal math
pub mod engine; // Control-thread graph manager
pub mod error;
pub mod graph; // Composable mono graph nodes
pub mod io; // Device output and offline export
pub mod synth; // Render-thread side: messages, slots, renderer
pub mod voices; // One voice per track kind

pub use config::{BreathConfig, EngineConfig, ModulationConfig, PanTimingConfig, SafetyConfig};
pub use engine::{Engine, EngineEvent, EngineStats, TrackId, TrackSpec, TrackUpdate};
pub use error::{EngineError, Result};
pub use synth::renderer::Renderer;

pub const MAX_BLOCK_SIZE: usize = 2048;
pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;

/// Maximum number of simultaneously live tracks on the render thread.
pub const MAX_TRACKS: usize = 64;
/// Maximum number of tracks with breathing modulation registered.
pub const MAX_MOD_TRACKS: usize = 16;
/// Maximum number of modulated parameters per track.
pub const MAX_MOD_PARAMS: usize = 8;
/// Maximum number of control points in a breathing period trajectory.
pub const MAX_TRAJECTORY_POINTS: usize = 16;
