use crate::{
    graph::node::{GraphNode, RenderCtx},
    MAX_BLOCK_SIZE,
};

/// Multiply a signal by a control signal (gating, tremolo, ring modulation).
pub struct Amplify<N, M> {
    pub signal: N,
    pub modulator: M,
    temp_buffer: Vec<f32>,
}

impl<N, M> Amplify<N, M> {
    pub fn new(signal: N, modulator: M) -> Self {
        Self {
            signal,
            modulator,
            temp_buffer: vec![0.0; MAX_BLOCK_SIZE],
        }
    }
}

impl<N: GraphNode, M: GraphNode> GraphNode for Amplify<N, M> {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        self.signal.render_block(out, ctx);

        // Slice temp buffer to match output size (RT-safe, no allocation)
        let frames = &mut self.temp_buffer[..out.len()];
        frames.fill(0.0);
        self.modulator.render_block(frames, ctx);

        for (o, m) in out.iter_mut().zip(frames.iter()) {
            *o *= *m;
        }
    }

    fn is_active(&self) -> bool {
        self.modulator.is_active() && self.signal.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{extensions::NodeExt, oscillator::OscNode, pulse::PulseGate};

    #[test]
    fn closed_gate_silences_carrier() {
        let ctx = RenderCtx::new(48_000.0, 0);
        // 0.1 Hz at 5% duty: the gate closes after half a second.
        let mut gated = OscNode::sine(440.0).amplify(PulseGate::new(0.1, 0.05));
        let mut first = vec![0.0; 2048];
        gated.render_block(&mut first, &ctx);
        assert!(first.iter().any(|s| s.abs() > 0.1));

        let mut block = vec![0.0; 2048];
        for _ in 0..20 {
            gated.render_block(&mut block, &ctx);
        }
        assert!(block.iter().all(|s| s.abs() < 1e-3));
    }
}
