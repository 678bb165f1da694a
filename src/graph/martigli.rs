use crate::dsp::breath::{
    clamp_inhale_ratio, clamp_period, shape_value, BreathShape, Trajectory,
};
use crate::graph::node::{GraphNode, RenderCtx};

/*
Breathing Oscillator
====================

The shared low-frequency source every modulated parameter follows. It runs
at breathing pace (a few seconds per cycle) and never makes sound itself.

Each sample:

    period  = trajectory(elapsed)          piecewise-linear, last point holds
    phase  += 1 / (period × sample_rate)   wraps modulo 1
    value   = shape(phase, inhale_ratio)   always in [-1, 1]

The trajectory lets a session slow the breath down over time, e.g. start
at 6 s per breath and glide to 12 s over ten minutes:

    [{ period: 6, duration: 0 }, { period: 12, duration: 600 }]

The same oscillator runs in two places. On the render thread it advances
sample by sample. When that path is disabled the control thread owns one
instead and advances it in coarse steps with `advance`.
*/

/// Largest step used when advancing by wall-clock time.
const ADVANCE_STEP_SECS: f64 = 0.005;

/// Breathing state published to the control side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BreathSnapshot {
    /// Current value in [-1, 1].
    pub value: f32,
    /// Current phase in [0, 1).
    pub phase: f64,
    pub elapsed_samples: u64,
    /// Instantaneous period in seconds.
    pub period: f32,
}

#[derive(Debug, Clone)]
pub struct BreathingOscillator {
    shape: BreathShape,
    inhale_ratio: f32,
    trajectory: Trajectory,
    fallback_period: f32,

    phase: f64,
    elapsed_samples: u64,
    /// Elapsed time tracked separately so coarse control-thread steps stay exact.
    elapsed_secs: f64,
    period: f32,
    value: f32,
}

impl BreathingOscillator {
    pub fn new(shape: BreathShape, inhale_ratio: f32, trajectory: Trajectory, period: f32) -> Self {
        let mut osc = Self {
            shape,
            inhale_ratio: clamp_inhale_ratio(inhale_ratio),
            trajectory,
            fallback_period: clamp_period(period),
            phase: 0.0,
            elapsed_samples: 0,
            elapsed_secs: 0.0,
            period: clamp_period(period),
            value: 0.0,
        };
        osc.refresh();
        osc
    }

    /// Replace shape, ratio and trajectory. Phase and clock keep running.
    pub fn configure(&mut self, shape: BreathShape, inhale_ratio: f32, trajectory: Trajectory, period: f32) {
        self.shape = shape;
        self.inhale_ratio = clamp_inhale_ratio(inhale_ratio);
        self.trajectory = trajectory;
        self.fallback_period = clamp_period(period);
        self.refresh();
    }

    /// Phase and elapsed counters back to zero.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.elapsed_samples = 0;
        self.elapsed_secs = 0.0;
        self.refresh();
    }

    fn refresh(&mut self) {
        self.period = self
            .trajectory
            .period_at(self.elapsed_secs, self.fallback_period);
        self.value = shape_value(self.phase, self.inhale_ratio, self.shape);
    }

    /// Advance one sample and return the new value.
    #[inline]
    pub fn next_sample(&mut self, sample_rate: f32) -> f32 {
        let dt = 1.0 / sample_rate as f64;
        self.step(dt);
        self.elapsed_samples += 1;
        self.value
    }

    /// Advance by `seconds` of wall-clock time in bounded steps.
    pub fn advance(&mut self, seconds: f64, sample_rate: f32) {
        if seconds.is_nan() || seconds <= 0.0 {
            return;
        }
        let mut remaining = seconds;
        while remaining > 0.0 {
            let dt = remaining.min(ADVANCE_STEP_SECS);
            self.step(dt);
            remaining -= dt;
        }
        self.elapsed_samples = (self.elapsed_secs * sample_rate as f64).round() as u64;
    }

    #[inline]
    fn step(&mut self, dt: f64) {
        self.period = self
            .trajectory
            .period_at(self.elapsed_secs, self.fallback_period);
        self.phase = (self.phase + dt / self.period as f64).rem_euclid(1.0);
        // rem_euclid can round up to exactly 1.0 for tiny negative residue
        if self.phase >= 1.0 {
            self.phase = 0.0;
        }
        self.elapsed_secs += dt;
        self.value = shape_value(self.phase, self.inhale_ratio, self.shape);
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Value the shape takes `offset` cycles from the current phase.
    pub fn value_at_offset(&self, offset: f64) -> f32 {
        shape_value(self.phase + offset, self.inhale_ratio, self.shape)
    }

    pub fn shape(&self) -> BreathShape {
        self.shape
    }

    pub fn inhale_ratio(&self) -> f32 {
        self.inhale_ratio
    }

    pub fn snapshot(&self) -> BreathSnapshot {
        BreathSnapshot {
            value: self.value,
            phase: self.phase,
            elapsed_samples: self.elapsed_samples,
            period: self.period,
        }
    }
}

impl GraphNode for BreathingOscillator {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        for sample in out.iter_mut() {
            *sample = self.next_sample(ctx.sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::breath::TrajectoryPoint;

    #[test]
    fn value_and_phase_stay_in_range() {
        let trajectory = Trajectory::from_points(&[
            TrajectoryPoint::new(0.5, 0.0),
            TrajectoryPoint::new(3.0, 2.0),
        ]);
        for shape in [
            BreathShape::Sine,
            BreathShape::Triangle,
            BreathShape::Sawtooth,
            BreathShape::Square,
        ] {
            let mut osc = BreathingOscillator::new(shape, 0.3, trajectory, 10.0);
            let ctx = RenderCtx::new(8_000.0, 0);
            let mut block = vec![0.0; 512];
            for _ in 0..80 {
                osc.render_block(&mut block, &ctx);
                assert!(block.iter().all(|v| (-1.0..=1.0).contains(v)));
                assert!((0.0..1.0).contains(&osc.phase()));
            }
        }
    }

    #[test]
    fn one_period_returns_to_start() {
        let sample_rate = 1_000.0;
        let mut osc = BreathingOscillator::new(BreathShape::Sine, 0.5, Trajectory::default(), 2.0);
        let start = osc.value();
        for _ in 0..2_000 {
            osc.next_sample(sample_rate);
        }
        assert!((osc.value() - start).abs() < 1e-3);
        assert_eq!(osc.snapshot().elapsed_samples, 2_000);
        assert_eq!(osc.snapshot().period, 2.0);
    }

    #[test]
    fn coarse_advance_matches_per_sample() {
        let sample_rate = 1_000.0;
        let trajectory = Trajectory::from_points(&[
            TrajectoryPoint::new(4.0, 0.0),
            TrajectoryPoint::new(8.0, 10.0),
        ]);
        let mut fine = BreathingOscillator::new(BreathShape::Sine, 0.4, trajectory, 10.0);
        let mut coarse = fine.clone();
        for _ in 0..7_000 {
            fine.next_sample(sample_rate);
        }
        for _ in 0..140 {
            coarse.advance(0.05, sample_rate);
        }
        assert!((fine.phase() - coarse.phase()).abs() < 1e-3);
        assert_eq!(coarse.snapshot().elapsed_samples, 7_000);
    }

    #[test]
    fn reset_zeroes_counters() {
        let mut osc = BreathingOscillator::new(BreathShape::Sine, 0.5, Trajectory::default(), 4.0);
        for _ in 0..1_000 {
            osc.next_sample(1_000.0);
        }
        osc.reset();
        assert_eq!(osc.phase(), 0.0);
        assert_eq!(osc.snapshot().elapsed_samples, 0);
        assert_eq!(osc.value(), -1.0);
    }
}
