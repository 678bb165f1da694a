use crate::dsp::noise::{NoiseColor, NoiseSource};
use crate::graph::node::{GraphNode, RenderCtx};

/// Broadband noise bed (white, pink or brown).
pub struct NoiseNode {
    source: NoiseSource,
}

impl NoiseNode {
    pub fn new(color: NoiseColor) -> Self {
        Self {
            source: NoiseSource::new(color),
        }
    }

    pub fn seeded(color: NoiseColor, seed: u64) -> Self {
        Self {
            source: NoiseSource::with_seed(color, seed),
        }
    }

    pub fn color(&self) -> NoiseColor {
        self.source.color()
    }

    pub fn set_color(&mut self, color: NoiseColor) {
        self.source.set_color(color);
    }
}

impl GraphNode for NoiseNode {
    fn render_block(&mut self, out: &mut [f32], _ctx: &RenderCtx) {
        self.source.render(out);
    }
}
