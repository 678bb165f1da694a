//! Equal-power stereo panning.

use std::f32::consts::FRAC_PI_2;

use crate::dsp::lfo::bipolar_to_unipolar;

/// Clamp a pan position to [-1, 1]; NaN lands in the centre.
#[inline]
pub fn clamp_pan(position: f32) -> f32 {
    if position.is_nan() {
        0.0
    } else {
        position.clamp(-1.0, 1.0)
    }
}

/// Left/right gains for a mono signal at `position` (-1 left, +1 right).
///
/// Equal-power law: gains follow a quarter circle so L² + R² = 1 and the
/// perceived loudness stays constant while the source moves.
#[inline]
pub fn pan_gains(position: f32) -> (f32, f32) {
    let angle = bipolar_to_unipolar(clamp_pan(position)) * FRAC_PI_2;
    (angle.cos(), angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extremes_are_hard_panned() {
        let (l, r) = pan_gains(-1.0);
        assert!((l - 1.0).abs() < 1e-6 && r.abs() < 1e-6);
        let (l, r) = pan_gains(1.0);
        assert!(l.abs() < 1e-6 && (r - 1.0).abs() < 1e-6);
    }

    #[test]
    fn power_is_constant() {
        for step in -10..=10 {
            let (l, r) = pan_gains(step as f32 / 10.0);
            assert!((l * l + r * r - 1.0).abs() < 1e-5);
        }
    }
}
