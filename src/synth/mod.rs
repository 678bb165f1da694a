// Render-thread side: messages crossing the rings, per-voice slots,
// the modulation table and the renderer driving them all.

pub mod message;
pub mod modulation;
pub mod renderer;
pub mod slot;

pub use message::{RenderCommand, RenderEvent, Telemetry, TrackId};
pub use renderer::Renderer;
