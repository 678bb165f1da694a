use crate::dsp::{SmoothedValue, Smoothing};
use crate::graph::node::{GraphNode, Modulatable, RenderCtx};

/*
Isochronic Pulse Gate
=====================

An isochronic tone is a carrier switched on and off at a steady rate. This
node produces the switching signal, a 0..1 gate meant to be multiplied with
a carrier (`carrier.amplify(gate)`).

    1 ┐ ┌───┐   ┌───┐   ┌───┐
      │ │   │   │   │   │   │
    0 └─┘   └───┘   └───┘   └──
        |<->|  duty × period
        |<----->|  period = 1 / rate

A hard square gate clicks at every edge, so each transition is softened by
a one-pole smoother with a few milliseconds of time constant. At the default
duty of 0.5 this reproduces the classic "carrier gated where sin > 0" pulse.
*/

pub const PULSE_RATE_RANGE: (f32, f32) = (0.1, 40.0);
pub const DUTY_RANGE: (f32, f32) = (0.05, 0.95);
const EDGE_SECS: f32 = 0.002;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PulseParam {
    /// Pulses per second
    Rate,
    /// Fraction of each pulse period spent open
    Duty,
}

pub struct PulseGate {
    rate: SmoothedValue,
    duty: f32,
    phase: f64,
    level: f32,
    edge_coeff: f32,
    coeff_rate: f32,
}

impl PulseGate {
    pub fn new(rate: f32, duty: f32) -> Self {
        Self {
            rate: SmoothedValue::new(clamp_rate(rate)),
            duty: clamp_duty(duty),
            phase: 0.0,
            level: 0.0,
            edge_coeff: 1.0,
            coeff_rate: 0.0,
        }
    }

    fn update_coeff(&mut self, sample_rate: f32) {
        if self.coeff_rate != sample_rate {
            self.coeff_rate = sample_rate;
            self.edge_coeff = 1.0 - (-1.0 / (EDGE_SECS * sample_rate).max(1.0)).exp();
        }
    }
}

pub fn clamp_rate(rate: f32) -> f32 {
    if rate.is_nan() {
        PULSE_RATE_RANGE.0
    } else {
        rate.clamp(PULSE_RATE_RANGE.0, PULSE_RATE_RANGE.1)
    }
}

pub fn clamp_duty(duty: f32) -> f32 {
    if duty.is_nan() {
        0.5
    } else {
        duty.clamp(DUTY_RANGE.0, DUTY_RANGE.1)
    }
}

impl GraphNode for PulseGate {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        self.update_coeff(ctx.sample_rate);
        let inv_sr = 1.0 / ctx.sample_rate as f64;
        for sample in out.iter_mut() {
            let open = if self.phase < self.duty as f64 { 1.0 } else { 0.0 };
            self.level += (open - self.level) * self.edge_coeff;
            *sample = self.level;

            self.phase += self.rate.next() as f64 * inv_sr;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }
}

impl Modulatable for PulseGate {
    type Param = PulseParam;

    fn get_param(&self, param: Self::Param) -> f32 {
        match param {
            PulseParam::Rate => self.rate.target(),
            PulseParam::Duty => self.duty,
        }
    }

    fn set_param(&mut self, param: Self::Param, value: f32, smoothing: Smoothing, sample_rate: f32) {
        match param {
            PulseParam::Rate => self.rate.set(clamp_rate(value), smoothing, sample_rate),
            PulseParam::Duty => self.duty = clamp_duty(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_is_open_for_duty_fraction() {
        let sample_rate = 48_000.0;
        let ctx = RenderCtx::new(sample_rate, 0);
        let mut gate = PulseGate::new(10.0, 0.25);
        let mut block = vec![0.0; 48_000];
        gate.render_block(&mut block, &ctx);

        let open = block.iter().filter(|v| **v > 0.5).count() as f32 / block.len() as f32;
        assert!((open - 0.25).abs() < 0.01, "open fraction {open}");
        assert!(block.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn parameters_are_clamped() {
        let mut gate = PulseGate::new(100.0, 0.0);
        assert_eq!(gate.get_param(PulseParam::Rate), 40.0);
        assert_eq!(gate.get_param(PulseParam::Duty), 0.05);
        gate.set_param(PulseParam::Rate, 0.0, Smoothing::Immediate, 48_000.0);
        assert_eq!(gate.get_param(PulseParam::Rate), 0.1);
    }
}
