#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OscillatorWaveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl OscillatorWaveform {
    /// Evaluate one cycle of the waveform at `phase` in [0, 1).
    #[inline]
    pub fn evaluate(self, phase: f64) -> f32 {
        match self {
            OscillatorWaveform::Sine => (TAU * phase).sin() as f32,
            OscillatorWaveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            OscillatorWaveform::Sawtooth => (2.0 * phase - 1.0) as f32,
            OscillatorWaveform::Triangle => (1.0 - 4.0 * (phase - 0.5).abs()) as f32,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OscillatorWaveform::Sine => "sine",
            OscillatorWaveform::Square => "square",
            OscillatorWaveform::Sawtooth => "sawtooth",
            OscillatorWaveform::Triangle => "triangle",
        }
    }
}

/// Phase-accumulator oscillator.
///
/// The phase is kept in f64 so long sessions (an hour at 48 kHz is ~1.7e8
/// samples) do not drift audibly.
#[derive(Debug, Clone)]
pub struct OscillatorBlock {
    waveform: OscillatorWaveform,
    phase: f64,
}

impl OscillatorBlock {
    pub fn new(waveform: OscillatorWaveform) -> Self {
        Self {
            waveform,
            phase: 0.0,
        }
    }

    pub fn sine() -> Self {
        Self::new(OscillatorWaveform::Sine)
    }

    pub fn waveform(&self) -> OscillatorWaveform {
        self.waveform
    }

    pub fn set_waveform(&mut self, waveform: OscillatorWaveform) {
        self.waveform = waveform;
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Output the current sample, then advance by one sample at `frequency`.
    #[inline]
    pub fn next_sample(&mut self, frequency: f32, sample_rate: f32) -> f32 {
        let out = self.waveform.evaluate(self.phase);
        self.phase += frequency as f64 / sample_rate as f64;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }
        out
    }

    /// Fill `destination` at a fixed frequency.
    pub fn render(&mut self, destination: &mut [f32], frequency: f32, sample_rate: f32) {
        for sample in destination.iter_mut() {
            *sample = self.next_sample(frequency, sample_rate);
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveforms_stay_bipolar() {
        for waveform in [
            OscillatorWaveform::Sine,
            OscillatorWaveform::Square,
            OscillatorWaveform::Sawtooth,
            OscillatorWaveform::Triangle,
        ] {
            let mut osc = OscillatorBlock::new(waveform);
            let mut buffer = vec![0.0; 1000];
            osc.render(&mut buffer, 313.0, 8_000.0);
            assert!(
                buffer.iter().all(|s| (-1.0..=1.0).contains(s)),
                "{} left [-1, 1]",
                waveform.name()
            );
        }
    }

    #[test]
    fn phase_wraps_below_one() {
        let mut osc = OscillatorBlock::sine();
        for _ in 0..10_000 {
            osc.next_sample(3_999.0, 8_000.0);
            assert!((0.0..1.0).contains(&osc.phase()));
        }
    }

    #[test]
    fn triangle_peaks_mid_cycle() {
        assert_eq!(OscillatorWaveform::Triangle.evaluate(0.0), -1.0);
        assert_eq!(OscillatorWaveform::Triangle.evaluate(0.5), 1.0);
    }
}
