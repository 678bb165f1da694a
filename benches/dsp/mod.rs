//! Benchmarks for low-level DSP primitives.

mod breathing;
mod noise;
mod oscillator;

pub use breathing::bench_breathing;
pub use noise::bench_noise;
pub use oscillator::bench_oscillator;
