use crate::dsp::{SmoothedValue, Smoothing};
use crate::graph::RenderCtx;
use crate::synth::message::{StopPlan, TrackId};
use crate::voices::TrackVoice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Playing,
    /// Fading out; the slot is done once `age` reaches `until`.
    Stopping { until: u64 },
}

/// A live voice on the render thread with its start/stop fader.
pub struct Slot {
    pub id: TrackId,
    pub voice: Box<TrackVoice>,
    fader: SmoothedValue,
    state: SlotState,
    /// Frames rendered since the voice was added.
    age: u64,
    stop: Option<StopPlan>,
    sample_rate: f32,
}

impl Slot {
    pub fn new(
        id: TrackId,
        voice: Box<TrackVoice>,
        fade_in_frames: u32,
        stop: Option<StopPlan>,
        sample_rate: f32,
    ) -> Self {
        let mut fader = SmoothedValue::new(0.0);
        if fade_in_frames == 0 {
            fader.set(1.0, Smoothing::Immediate, sample_rate);
        } else {
            fader.set(
                1.0,
                Smoothing::Linear {
                    duration: fade_in_frames as f32 / sample_rate,
                },
                sample_rate,
            );
        }
        Self {
            id,
            voice,
            fader,
            state: SlotState::Playing,
            age: 0,
            stop,
            sample_rate,
        }
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Begin the fade-out now. An earlier deadline is never pushed back.
    pub fn stop(&mut self, fade_frames: u32) {
        let until = self.age + fade_frames as u64;
        if let SlotState::Stopping { until: current } = self.state {
            if current <= until {
                return;
            }
        }
        let smoothing = if fade_frames == 0 {
            Smoothing::Immediate
        } else {
            Smoothing::Linear {
                duration: fade_frames as f32 / self.sample_rate,
            }
        };
        self.fader.set(0.0, smoothing, self.sample_rate);
        self.state = SlotState::Stopping { until };
        self.stop = None;
    }

    /// Render the voice into the zeroed `voice_*` scratch and add it, faded,
    /// into `out_*`.
    pub fn render(
        &mut self,
        voice_l: &mut [f32],
        voice_r: &mut [f32],
        out_l: &mut [f32],
        out_r: &mut [f32],
        ctx: &RenderCtx,
    ) {
        if self.is_done() {
            return;
        }

        self.voice.render(voice_l, voice_r, ctx);

        for (((vl, vr), ol), or) in voice_l
            .iter()
            .zip(voice_r.iter())
            .zip(out_l.iter_mut())
            .zip(out_r.iter_mut())
        {
            if let Some(plan) = self.stop {
                if self.age >= plan.fade_start {
                    self.stop(plan.fade_frames);
                }
            }
            if let SlotState::Stopping { until } = self.state {
                if self.age >= until {
                    break;
                }
            }
            let gain = self.fader.next();
            *ol += vl * gain;
            *or += vr * gain;
            self.age += 1;
        }
    }

    pub fn is_done(&self) -> bool {
        match self.state {
            SlotState::Stopping { until } => self.age >= until,
            SlotState::Playing => self.voice.is_finished(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::OscillatorWaveform;
    use crate::voices::ToneVoice;

    fn square_slot(fade_in: u32, stop: Option<StopPlan>) -> Slot {
        // Slow square wave: every sample is ±1 times the fader.
        let voice = ToneVoice::new(OscillatorWaveform::Square, 20.0, 1.0, -1.0);
        Slot::new(TrackId(1), Box::new(TrackVoice::Tone(voice)), fade_in, stop, 1_000.0)
    }

    fn run(slot: &mut Slot, frames: usize) -> Vec<f32> {
        let mut vl = vec![0.0; frames];
        let mut vr = vec![0.0; frames];
        let mut ol = vec![0.0; frames];
        let mut or = vec![0.0; frames];
        slot.render(&mut vl, &mut vr, &mut ol, &mut or, &RenderCtx::new(1_000.0, 0));
        ol
    }

    #[test]
    fn fades_in_linearly() {
        let mut slot = square_slot(10, None);
        let out = run(&mut slot, 20);
        assert!((out[0].abs() - 0.1).abs() < 1e-5);
        assert!((out[4].abs() - 0.5).abs() < 1e-5);
        assert!((out[15].abs() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn stop_plan_ends_on_exact_frame() {
        let mut slot = square_slot(
            0,
            Some(StopPlan {
                fade_start: 30,
                fade_frames: 10,
            }),
        );
        let out = run(&mut slot, 50);
        assert!((out[29].abs() - 1.0).abs() < 1e-5);
        assert!(out[35].abs() < 0.6);
        assert!(out[40..].iter().all(|s| *s == 0.0));
        assert!(slot.is_done());
    }

    #[test]
    fn stop_without_fade_is_immediate() {
        let mut slot = square_slot(0, None);
        run(&mut slot, 5);
        slot.stop(0);
        assert!(slot.is_done());
        assert!(run(&mut slot, 5).iter().all(|s| *s == 0.0));
    }
}
