use crate::dsp::pan::{clamp_pan, pan_gains};
use crate::dsp::{SmoothedValue, Smoothing};

/// Places a mono signal in the stereo field.
///
/// The position glides under the same smoothing as every other live
/// parameter, so automation arriving every few tens of milliseconds moves the
/// source continuously.
#[derive(Debug, Clone, Copy)]
pub struct Panner {
    position: SmoothedValue,
}

impl Panner {
    pub fn new(position: f32) -> Self {
        Self {
            position: SmoothedValue::new(clamp_pan(position)),
        }
    }

    pub fn position(&self) -> f32 {
        self.position.target()
    }

    pub fn set_position(&mut self, position: f32, smoothing: Smoothing, sample_rate: f32) {
        self.position.set(clamp_pan(position), smoothing, sample_rate);
    }

    /// Add `mono` into `left`/`right` at the current position.
    pub fn process(&mut self, mono: &[f32], left: &mut [f32], right: &mut [f32]) {
        if self.position.is_settled() {
            let (gain_l, gain_r) = pan_gains(self.position.current());
            for ((sample, l), r) in mono.iter().zip(left.iter_mut()).zip(right.iter_mut()) {
                *l += sample * gain_l;
                *r += sample * gain_r;
            }
            return;
        }

        for ((sample, l), r) in mono.iter().zip(left.iter_mut()).zip(right.iter_mut()) {
            let (gain_l, gain_r) = pan_gains(self.position.next());
            *l += sample * gain_l;
            *r += sample * gain_r;
        }
    }
}

impl Default for Panner {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_left_only_reaches_left() {
        let mut panner = Panner::new(-1.0);
        let mono = [0.5; 16];
        let mut left = [0.0; 16];
        let mut right = [0.0; 16];
        panner.process(&mono, &mut left, &mut right);
        assert!(left.iter().all(|s| (s - 0.5).abs() < 1e-6));
        assert!(right.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn glides_to_new_position() {
        let mut panner = Panner::new(-1.0);
        panner.set_position(1.0, Smoothing::Linear { duration: 0.01 }, 1_000.0);
        let mono = [1.0; 10];
        let mut left = [0.0; 10];
        let mut right = [0.0; 10];
        panner.process(&mono, &mut left, &mut right);
        assert!(left[0] > left[9]);
        assert!(right[0] < right[9]);
        assert!((right[9] - 1.0).abs() < 1e-6);
    }
}
