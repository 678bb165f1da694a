//! Coloured noise sources.

/*
Noise Colours
=============

  white   Every frequency at equal power. Harsh, hissy.
  pink    Power falls 3 dB per octave (1/f). Sounds "even" to the ear,
          like rain or a waterfall.
  brown   Power falls 6 dB per octave (1/f^2). Deep rumble, surf.

Pink noise uses the Voss-McCartney scheme: 16 rows of random values where
row k is refreshed every 2^k samples. Summing the rows gives an approximate
1/f spectrum at the cost of a handful of random draws per sample.

Brown noise is integrated white noise. A pure integrator wanders off to
infinity, so a small leak pulls it back toward zero.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const PINK_ROWS: usize = 16;
const BROWN_LEAK: f32 = 0.02;
const BROWN_GAIN: f32 = 3.5;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseColor {
    #[default]
    White,
    Pink,
    Brown,
}

impl NoiseColor {
    pub fn name(self) -> &'static str {
        match self {
            NoiseColor::White => "white",
            NoiseColor::Pink => "pink",
            NoiseColor::Brown => "brown",
        }
    }
}

pub struct NoiseSource {
    color: NoiseColor,
    rng: fastrand::Rng,
    rows: [f32; PINK_ROWS],
    running_sum: f32,
    index: u32,
    brown: f32,
}

impl NoiseSource {
    pub fn new(color: NoiseColor) -> Self {
        Self::with_rng(color, fastrand::Rng::new())
    }

    /// Deterministic source, used by tests and offline renders.
    pub fn with_seed(color: NoiseColor, seed: u64) -> Self {
        Self::with_rng(color, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(color: NoiseColor, rng: fastrand::Rng) -> Self {
        Self {
            color,
            rng,
            rows: [0.0; PINK_ROWS],
            running_sum: 0.0,
            index: 0,
            brown: 0.0,
        }
    }

    pub fn color(&self) -> NoiseColor {
        self.color
    }

    pub fn set_color(&mut self, color: NoiseColor) {
        self.color = color;
    }

    #[inline]
    fn white(&mut self) -> f32 {
        self.rng.f32() * 2.0 - 1.0
    }

    #[inline]
    fn pink(&mut self) -> f32 {
        self.index = self.index.wrapping_add(1);
        let changed = (self.index ^ self.index.wrapping_sub(1)).trailing_ones() as usize;
        for row in 0..changed.min(PINK_ROWS) {
            self.running_sum -= self.rows[row];
            self.rows[row] = self.white();
            self.running_sum += self.rows[row];
        }
        self.running_sum / PINK_ROWS as f32 * 2.0
    }

    #[inline]
    fn brown(&mut self) -> f32 {
        let white = self.white();
        self.brown = (self.brown + BROWN_LEAK * white) / (1.0 + BROWN_LEAK);
        self.brown * BROWN_GAIN
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let sample = match self.color {
            NoiseColor::White => self.white(),
            NoiseColor::Pink => self.pink(),
            NoiseColor::Brown => self.brown(),
        };
        sample.clamp(-1.0, 1.0)
    }

    pub fn render(&mut self, destination: &mut [f32]) {
        for sample in destination.iter_mut() {
            *sample = self.next_sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mean_abs_step(color: NoiseColor) -> f32 {
        let mut source = NoiseSource::with_seed(color, 7);
        let mut buffer = vec![0.0; 8192];
        source.render(&mut buffer);
        buffer.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f32>() / 8191.0
    }

    #[test]
    fn every_colour_is_bounded() {
        for color in [NoiseColor::White, NoiseColor::Pink, NoiseColor::Brown] {
            let mut source = NoiseSource::with_seed(color, 42);
            let mut buffer = vec![0.0; 4096];
            source.render(&mut buffer);
            assert!(buffer.iter().all(|s| (-1.0..=1.0).contains(s)));
            assert!(buffer.iter().any(|s| s.abs() > 0.0));
        }
    }

    #[test]
    fn darker_colours_move_more_slowly() {
        // Less high-frequency energy shows up as smaller sample-to-sample steps.
        let white = mean_abs_step(NoiseColor::White);
        let pink = mean_abs_step(NoiseColor::Pink);
        let brown = mean_abs_step(NoiseColor::Brown);
        assert!(white > pink, "white {white} vs pink {pink}");
        assert!(pink > brown, "pink {pink} vs brown {brown}");
    }
}
