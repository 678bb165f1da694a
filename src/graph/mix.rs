use crate::{
    graph::node::{GraphNode, RenderCtx},
    MAX_BLOCK_SIZE,
};

/*
Parallel Signal Mixing
======================

Mix renders two sources and blends them linearly:

    output = A × (1 - balance) + B × balance

With balance = 0.5 both sources sit at half amplitude. That is exactly how
a monaural beat is formed: the two tones of the pair are summed at half
level into one signal, so the beat happens in the air (or the headphone
driver) instead of between the ears.

    left tone  (198 Hz) ─┐
                         ├─ 0.5·L + 0.5·R ─→ one channel, beating at 4 Hz
    right tone (202 Hz) ─┘

The sources stay public so a beat voice can also render them separately
when it switches to dichotic (binaural) output.
*/

pub struct Mix<A, B> {
    pub source_a: A,
    pub source_b: B,
    balance: f32, // 0.0 = all A, 1.0 = all B, 0.5 = equal mix
    temp_buffer: Vec<f32>,
}

impl<A, B> Mix<A, B> {
    pub fn new(source_a: A, source_b: B, balance: f32) -> Self {
        Mix {
            source_a,
            source_b,
            balance: balance.clamp(0.0, 1.0),
            temp_buffer: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    pub fn balance(&self) -> f32 {
        self.balance
    }
}

impl<S: GraphNode, M: GraphNode> GraphNode for Mix<S, M> {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        self.source_a.render_block(out, ctx);

        let frames = &mut self.temp_buffer[..out.len()];
        frames.fill(0.0);

        self.source_b.render_block(frames, ctx);

        let weight_a = 1.0 - self.balance;
        let weight_b = self.balance;
        for (o, b) in out.iter_mut().zip(frames.iter()) {
            *o = (*o * weight_a) + (*b * weight_b);
        }
    }

    fn is_active(&self) -> bool {
        self.source_a.is_active() || self.source_b.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{extensions::NodeExt, oscillator::OscNode};

    #[test]
    fn equal_mix_halves_each_source() {
        let ctx = RenderCtx::new(48_000.0, 0);
        let mut single = OscNode::sine(200.0);
        let mut pair = OscNode::sine(200.0).mix(OscNode::sine(200.0), 0.5);

        let mut expected = vec![0.0; 256];
        let mut actual = vec![0.0; 256];
        single.render_block(&mut expected, &ctx);
        pair.render_block(&mut actual, &ctx);

        for (e, a) in expected.iter().zip(actual.iter()) {
            assert!((e - a).abs() < 1e-6);
        }
    }

    #[test]
    fn beating_pair_cancels_at_half_beat_period() {
        // 200 Hz and 204 Hz beat at 4 Hz: silent around t = 0.125 s.
        let sample_rate = 48_000.0;
        let ctx = RenderCtx::new(sample_rate, 0);
        let mut pair = OscNode::sine(200.0).mix(OscNode::sine(204.0), 0.5);
        let mut block = vec![0.0; 2_000];
        for _ in 0..3 {
            pair.render_block(&mut block, &ctx);
        }

        // last 100 samples before 6000
        let around_null = &block[1_900..2_000];
        assert!(around_null.iter().all(|s| s.abs() < 0.05));
    }
}
