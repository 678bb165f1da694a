//! Offline rendering and WAV export.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;

use crate::engine::{Engine, EngineEvent};
use crate::error::Result;
use crate::synth::Renderer;

/// Stereo audio rendered without a device, plus what the engine reported.
#[derive(Debug, Clone, Default)]
pub struct OfflineRender {
    pub sample_rate: u32,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub events: Vec<EngineEvent>,
}

impl OfflineRender {
    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn duration(&self) -> f64 {
        self.left.len() as f64 / self.sample_rate.max(1) as f64
    }

    pub fn write_wav(&self, path: impl AsRef<Path>) -> Result<()> {
        write_wav(path, self.sample_rate, &self.left, &self.right)
    }
}

/// Run the renderer and the engine in lock-step for `seconds` of audio.
///
/// The engine ticks after every block, so timers fire with block accuracy.
/// With `stop_when_idle` the render ends early once no track is left.
pub fn render_offline(
    engine: &mut Engine,
    renderer: &mut Renderer,
    seconds: f64,
    block_size: usize,
    stop_when_idle: bool,
) -> OfflineRender {
    let sample_rate = renderer.sample_rate();
    let block_size = block_size.clamp(1, crate::MAX_BLOCK_SIZE);
    let total = (seconds.max(0.0) * sample_rate as f64).round() as usize;

    let mut render = OfflineRender {
        sample_rate: sample_rate.round() as u32,
        left: Vec::with_capacity(total),
        right: Vec::with_capacity(total),
        events: Vec::new(),
    };
    let mut left = vec![0.0; block_size];
    let mut right = vec![0.0; block_size];

    while render.left.len() < total {
        let frames = block_size.min(total - render.left.len());
        renderer.process(&mut left[..frames], &mut right[..frames]);
        render.left.extend_from_slice(&left[..frames]);
        render.right.extend_from_slice(&right[..frames]);
        render.events.extend(engine.tick());

        if stop_when_idle && engine.track_count() == 0 && renderer.active_voices() == 0 {
            break;
        }
    }
    render
}

/// Write 32-bit float stereo.
pub fn write_wav(path: impl AsRef<Path>, sample_rate: u32, left: &[f32], right: &[f32]) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path.as_ref(), spec)?;
    for (l, r) in left.iter().zip(right.iter()) {
        writer.write_sample(*l)?;
        writer.write_sample(*r)?;
    }
    writer.finalize()?;
    info!(path = %path.as_ref().display(), frames = left.len().min(right.len()), "wav written");
    Ok(())
}
