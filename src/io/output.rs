//! Live playback on the default cpal output device.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::synth::renderer::Renderer;

/// A running device stream. Audio stops when it is dropped.
pub struct OutputStream {
    _stream: cpal::Stream,
    sample_rate: f32,
    channels: usize,
    device: String,
}

impl OutputStream {
    /// Initialise `engine` at the device's rate and start pulling audio from
    /// its renderer on the device callback.
    pub fn open_default(engine: &mut Engine) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(EngineError::NoOutputDevice)?;
        let config = device.default_output_config()?;
        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(EngineError::UnsupportedSampleFormat(format!(
                "{:?}",
                config.sample_format()
            )));
        }

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;
        let name = device.name().unwrap_or_else(|_| "unknown device".to_string());

        let stream = attach(engine, sample_rate, |mut renderer| {
            let stream = device.build_output_stream(
                &config.into(),
                move |data: &mut [f32], _| renderer.process_interleaved(data, channels),
                |err| error!(%err, "audio stream error"),
                None,
            )?;
            stream.play()?;
            Ok(stream)
        })?;

        info!(device = %name, sample_rate, channels, "output stream started");
        Ok(Self {
            _stream: stream,
            sample_rate,
            channels,
            device: name,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device
    }
}

/// Initialise `engine` and hand its renderer to `start`. If `start` fails the
/// context is closed again, so a later attempt can initialise from scratch.
fn attach<T>(
    engine: &mut Engine,
    sample_rate: f32,
    start: impl FnOnce(Renderer) -> Result<T>,
) -> Result<T> {
    let renderer = engine.init(sample_rate)?;
    start(renderer).inspect_err(|err| {
        error!(%err, "output stream failed to start");
        engine.close();
    })
}
