//! Output level metering.

/// Windowed RMS and peak meter over stereo frames.
///
/// The RMS of a completed window is latched so readers always see a value
/// that covers a full window, never a partial one.
#[derive(Debug, Clone)]
pub struct RmsMeter {
    window: u32,
    sum_squares: f64,
    count: u32,
    rms: f32,
    peak: f32,
}

impl RmsMeter {
    /// `window_secs` of audio per RMS reading.
    pub fn new(sample_rate: f32, window_secs: f32) -> Self {
        Self {
            window: (sample_rate * window_secs).round().max(1.0) as u32,
            sum_squares: 0.0,
            count: 0,
            rms: 0.0,
            peak: 0.0,
        }
    }

    #[inline]
    pub fn push(&mut self, left: f32, right: f32) {
        let mean_square = (left * left + right * right) as f64 * 0.5;
        self.sum_squares += mean_square;
        self.count += 1;
        self.peak = self.peak.max(left.abs()).max(right.abs());
        if self.count >= self.window {
            self.rms = (self.sum_squares / self.count as f64).sqrt() as f32;
            self.sum_squares = 0.0;
            self.count = 0;
        }
    }

    pub fn rms(&self) -> f32 {
        self.rms
    }

    /// Peak since the last call.
    pub fn take_peak(&mut self) -> f32 {
        std::mem::take(&mut self.peak)
    }
}

/// RMS of a mono buffer.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_signal_has_its_own_rms() {
        let mut meter = RmsMeter::new(1_000.0, 0.1);
        for _ in 0..100 {
            meter.push(0.5, 0.5);
        }
        assert!((meter.rms() - 0.5).abs() < 1e-6);
        assert_eq!(meter.take_peak(), 0.5);
        assert_eq!(meter.take_peak(), 0.0);
    }

    #[test]
    fn full_scale_sine_is_one_over_root_two() {
        let samples: Vec<f32> = (0..1000)
            .map(|n| (std::f32::consts::TAU * n as f32 / 100.0).sin())
            .collect();
        assert!((rms(&samples) - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    }
}
