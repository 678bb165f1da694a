//! Parameter modulation primitives.

/*
Parameter Modulation
====================

A breathing-driven parameter follows the shared breathing signal:

    modulated_value = clamp(base + depth × signal, min, max)

  base     The parameter's value when the signal is 0.
  depth    How far the parameter swings. Negative depth inverts the motion
           (the parameter falls while the breath rises).
  signal   The breathing value, always in [-1, 1].
  min/max  Hard bounds. Whatever base and depth say, the result never leaves
           this range, which keeps frequencies audible and gains safe.

Example: gain breathing between 0.2 and 0.6
    base = 0.4, depth = 0.2, min = 0.0, max = 1.0

    signal = -1.0  →  0.4 - 0.2 = 0.2
    signal =  0.0  →  0.4
    signal = +1.0  →  0.4 + 0.2 = 0.6

Example: aggressive depth hitting the clamp
    base = 200 Hz, depth = 500 Hz, min = 20 Hz, max = 4000 Hz

    signal = -1.0  →  -300 Hz  →  clamped to 20 Hz

The clamp produces "flat spots" at the extremes of the breath instead of an
invalid value.

Both modulation paths (render thread and control-thread poller) call the
same function, so they agree to the bit for the same signal value.
*/

/// Unclamped modulation: base + (modulator × depth).
#[inline]
pub fn apply_modulation(base_value: f32, modulator: f32, depth: f32) -> f32 {
    base_value + (modulator * depth)
}

/// Modulation clamped to `[min, max]`. Swapped bounds are tolerated, a NaN
/// bound leaves that side open, and the result is always finite.
#[inline]
pub fn clamped_modulation(base_value: f32, modulator: f32, depth: f32, min: f32, max: f32) -> f32 {
    let min = finite_bound(min, f32::MIN);
    let max = finite_bound(max, f32::MAX);
    let (low, high) = if min <= max { (min, max) } else { (max, min) };
    let value = apply_modulation(base_value, modulator, depth);
    if value.is_nan() {
        return low;
    }
    value.clamp(low, high)
}

fn finite_bound(bound: f32, open: f32) -> f32 {
    if bound.is_nan() {
        open
    } else {
        bound.clamp(f32::MIN, f32::MAX)
    }
}
