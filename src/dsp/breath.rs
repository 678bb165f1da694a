//! Breathing-signal math: waveform shaping and period trajectories.

/*
The Breathing Signal
====================

The breathing (Martigli) signal is a very slow oscillation, one cycle per
breath, that paces the listener. It lives in [-1, 1] like any bipolar LFO,
but a breath is not symmetric: inhaling usually takes a different time than
exhaling. The cycle is therefore split in two at `inhale_ratio`:

  value
   +1 ┤        ╭──╮
      │      ╱      ╲
      │    ╱          ╲
   -1 ┼──╯              ╲───
      0      split          1   phase
      |<-inhale->|<-exhale->|

Each half is renormalised to its own 0..1 progress and mapped through the
chosen shape:

  sine       half-cosine: -cos(pi * p) rising, cos(pi * p) falling
  triangle   straight line
  sawtooth   straight line (same as triangle once the cycle is split)
  square     step at the middle of each half

Period Trajectory
-----------------

Sessions usually slow the breath down over time, e.g. from 6 s to 12 s over
ten minutes. The trajectory is a list of control points:

  [{ period: 6, duration: 0 }, { period: 12, duration: 600 }]

Point 0 applies immediately. Point i is reached from point i-1 by linear
interpolation over point i's duration. After the last point its period holds
forever.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::MAX_TRAJECTORY_POINTS;

pub const MIN_INHALE_RATIO: f32 = 0.05;
pub const MAX_INHALE_RATIO: f32 = 0.95;
pub const MIN_PERIOD: f32 = 0.5;
pub const MAX_PERIOD: f32 = 120.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreathShape {
    #[default]
    Sine,
    Triangle,
    Sawtooth,
    Square,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrajectoryPoint {
    /// Target period in seconds.
    pub period: f32,
    /// Time taken to reach `period` from the previous point (seconds).
    pub duration: f32,
}

impl TrajectoryPoint {
    pub fn new(period: f32, duration: f32) -> Self {
        Self { period, duration }
    }
}

/// Fixed-capacity trajectory so it can cross to the render thread by copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trajectory {
    points: [TrajectoryPoint; MAX_TRAJECTORY_POINTS],
    len: usize,
}

impl Trajectory {
    /// Build from control points; extra points beyond capacity are dropped.
    pub fn from_points(points: &[TrajectoryPoint]) -> Self {
        let mut fixed = [TrajectoryPoint::default(); MAX_TRAJECTORY_POINTS];
        let len = points.len().min(MAX_TRAJECTORY_POINTS);
        for (slot, point) in fixed.iter_mut().zip(points.iter()) {
            *slot = TrajectoryPoint {
                period: clamp_period(point.period),
                duration: if point.duration.is_finite() {
                    point.duration.max(0.0)
                } else {
                    0.0
                },
            };
        }
        Self { points: fixed, len }
    }

    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points[..self.len]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Instantaneous period at `elapsed` seconds, or `fallback` when empty.
    pub fn period_at(&self, elapsed: f64, fallback: f32) -> f32 {
        period_at(self.points(), elapsed, fallback)
    }
}

impl Default for Trajectory {
    fn default() -> Self {
        Self::from_points(&[])
    }
}

pub fn clamp_period(period: f32) -> f32 {
    if period.is_finite() {
        period.clamp(MIN_PERIOD, MAX_PERIOD)
    } else {
        MIN_PERIOD
    }
}

pub fn clamp_inhale_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() {
        ratio.clamp(MIN_INHALE_RATIO, MAX_INHALE_RATIO)
    } else {
        0.5
    }
}

/// Piecewise-linear period lookup.
pub fn period_at(points: &[TrajectoryPoint], elapsed: f64, fallback: f32) -> f32 {
    let Some(first) = points.first() else {
        return clamp_period(fallback);
    };

    let mut previous = first.period;
    let mut segment_start = 0.0_f64;
    for point in &points[1..] {
        let duration = point.duration as f64;
        let segment_end = segment_start + duration;
        if elapsed < segment_end {
            let progress = ((elapsed - segment_start) / duration) as f32;
            return previous + (point.period - previous) * progress.clamp(0.0, 1.0);
        }
        previous = point.period;
        segment_start = segment_end;
    }
    previous
}

/// Breath value in [-1, 1] at `phase` in [0, 1).
pub fn shape_value(phase: f64, inhale_ratio: f32, shape: BreathShape) -> f32 {
    let split = clamp_inhale_ratio(inhale_ratio) as f64;
    let phase = phase.rem_euclid(1.0);

    let value = if phase < split {
        let progress = phase / split;
        match shape {
            BreathShape::Sine => -(PI * progress).cos(),
            BreathShape::Triangle | BreathShape::Sawtooth => 2.0 * progress - 1.0,
            BreathShape::Square => {
                if progress < 0.5 {
                    -1.0
                } else {
                    1.0
                }
            }
        }
    } else {
        let progress = (phase - split) / (1.0 - split);
        match shape {
            BreathShape::Sine => (PI * progress).cos(),
            BreathShape::Triangle | BreathShape::Sawtooth => 1.0 - 2.0 * progress,
            BreathShape::Square => {
                if progress < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    };

    (value as f32).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_breath_hits_extremes_at_split() {
        assert!((shape_value(0.0, 0.3, BreathShape::Sine) + 1.0).abs() < 1e-6);
        assert!((shape_value(0.3, 0.3, BreathShape::Sine) - 1.0).abs() < 1e-6);
        assert!((shape_value(0.999_999, 0.3, BreathShape::Sine) + 1.0).abs() < 1e-4);
    }

    #[test]
    fn inhale_ratio_is_clamped() {
        // 0.0 behaves like 0.05: the peak sits at 5% of the cycle.
        let at_peak = shape_value(0.05, 0.0, BreathShape::Triangle);
        assert!((at_peak - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shapes_stay_in_range() {
        for shape in [
            BreathShape::Sine,
            BreathShape::Triangle,
            BreathShape::Sawtooth,
            BreathShape::Square,
        ] {
            for ratio in [0.0, 0.05, 0.4, 0.5, 0.95, 1.0] {
                for step in 0..1000 {
                    let value = shape_value(step as f64 / 1000.0, ratio, shape);
                    assert!((-1.0..=1.0).contains(&value));
                }
            }
        }
    }

    #[test]
    fn trajectory_interpolates_then_holds() {
        let points = [TrajectoryPoint::new(6.0, 0.0), TrajectoryPoint::new(12.0, 60.0)];
        assert_eq!(period_at(&points, 0.0, 10.0), 6.0);
        assert!((period_at(&points, 30.0, 10.0) - 9.0).abs() < 1e-5);
        assert_eq!(period_at(&points, 60.0, 10.0), 12.0);
        assert_eq!(period_at(&points, 6_000.0, 10.0), 12.0);
    }

    #[test]
    fn empty_trajectory_uses_fallback() {
        assert_eq!(Trajectory::default().period_at(12.0, 8.0), 8.0);
    }

    #[test]
    fn fixed_trajectory_clamps_periods() {
        let trajectory = Trajectory::from_points(&[TrajectoryPoint::new(0.01, 0.0)]);
        assert_eq!(trajectory.points()[0].period, MIN_PERIOD);
    }
}
