//! Real-world scenario benchmarks.
//!
//! These benchmarks model actual sessions: single track voices and a full
//! multi-track session driven through the renderer with modulation on.

mod session;
mod voices;

pub use session::bench_session;
pub use voices::bench_voices;
