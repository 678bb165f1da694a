use rtrb::{Consumer, Producer};

use crate::config::EngineConfig;
use crate::dsp::meter::RmsMeter;
use crate::dsp::{SmoothedValue, Smoothing};
use crate::graph::{BreathingOscillator, RenderCtx};
use crate::synth::message::{BreathCommand, ModCommand, RenderCommand, RenderEvent, Telemetry, TrackId};
use crate::synth::modulation::{ModTable, ModulatedValues};
use crate::synth::slot::Slot;
use crate::{MAX_BLOCK_SIZE, MAX_TRACKS};

/*
Render Thread
=============

The renderer is the only thing the audio callback touches. Per block it:

  1. drains the control rings (voice commands, modulation registry,
     breathing commands)
  2. renders every live slot into scratch buffers and sums them, each
     through its own fade-in / fade-out fader
  3. applies the master gain and meters the result
  4. advances the breathing oscillator sample by sample and, at a fixed
     cadence, publishes a snapshot with the modulated value of every
     registered parameter
  5. hands finished voices back to the control side

Nothing here allocates, locks or logs. Voices arrive already boxed and
leave the same way, so their memory is freed on the control thread.
*/

/// Ring ends owned by the render thread.
pub struct RenderChannels {
    pub commands: Consumer<RenderCommand>,
    pub modulation: Consumer<ModCommand>,
    pub breathing: Consumer<BreathCommand>,
    pub telemetry: Producer<Telemetry>,
    pub events: Producer<RenderEvent>,
}

pub struct Renderer {
    sample_rate: f32,
    frame: u64,
    slots: Vec<Slot>,
    channels: RenderChannels,

    breath: Option<BreathingOscillator>,
    table: ModTable,
    snapshot_interval: u64,
    until_snapshot: u64,

    master: SmoothedValue,
    meter: RmsMeter,

    voice_l: Vec<f32>,
    voice_r: Vec<f32>,
    out_l: Vec<f32>,
    out_r: Vec<f32>,
}

impl Renderer {
    pub(crate) fn new(
        sample_rate: f32,
        config: &EngineConfig,
        channels: RenderChannels,
        breath: Option<BreathingOscillator>,
    ) -> Self {
        let snapshot_rate = config.modulation.snapshot_rate_hz.clamp(1.0, 1_000.0);
        let snapshot_interval = (sample_rate / snapshot_rate).round().max(1.0) as u64;
        Self {
            sample_rate,
            frame: 0,
            slots: Vec::with_capacity(MAX_TRACKS),
            channels,
            breath,
            table: ModTable::new(),
            snapshot_interval,
            until_snapshot: snapshot_interval,
            master: SmoothedValue::new(config.master_gain.clamp(0.0, 1.0)),
            meter: RmsMeter::new(sample_rate, config.safety.check_interval_secs.max(0.01)),
            voice_l: vec![0.0; MAX_BLOCK_SIZE],
            voice_r: vec![0.0; MAX_BLOCK_SIZE],
            out_l: vec![0.0; MAX_BLOCK_SIZE],
            out_r: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Frames rendered so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn active_voices(&self) -> usize {
        self.slots.len()
    }

    pub fn has_breathing(&self) -> bool {
        self.breath.is_some()
    }

    /// Drop the breathing processor, as if it had failed to load.
    #[cfg(test)]
    pub(crate) fn detach_breathing(&mut self) {
        self.breath = None;
    }

    /// Render into separate left/right buffers of equal length.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        let mut offset = 0;
        while offset < frames {
            let end = (offset + MAX_BLOCK_SIZE).min(frames);
            self.render_block(&mut left[offset..end], &mut right[offset..end]);
            offset = end;
        }
    }

    /// Render into an interleaved device buffer.
    ///
    /// Mono devices get the average of both channels; channels beyond the
    /// second are silent.
    pub fn process_interleaved(&mut self, data: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let mut out_l = std::mem::take(&mut self.out_l);
        let mut out_r = std::mem::take(&mut self.out_r);

        for chunk in data.chunks_mut(MAX_BLOCK_SIZE * channels) {
            let frames = chunk.len() / channels;
            let (left, right) = (&mut out_l[..frames], &mut out_r[..frames]);
            self.render_block(left, right);

            for (frame, (l, r)) in chunk.chunks_mut(channels).zip(left.iter().zip(right.iter())) {
                if channels == 1 {
                    frame[0] = (l + r) * 0.5;
                    continue;
                }
                frame[0] = *l;
                frame[1] = *r;
                for extra in frame.iter_mut().skip(2) {
                    *extra = 0.0;
                }
            }
        }

        self.out_l = out_l;
        self.out_r = out_r;
    }

    fn render_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.drain_commands();

        let frames = left.len();
        let ctx = RenderCtx::new(self.sample_rate, self.frame);
        left.fill(0.0);
        right.fill(0.0);

        for slot in self.slots.iter_mut() {
            let voice_l = &mut self.voice_l[..frames];
            let voice_r = &mut self.voice_r[..frames];
            voice_l.fill(0.0);
            voice_r.fill(0.0);
            slot.render(voice_l, voice_r, left, right, &ctx);
        }

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let gain = self.master.next();
            *l *= gain;
            *r *= gain;
            self.meter.push(*l, *r);
        }

        for offset in 0..frames as u64 {
            if let Some(breath) = self.breath.as_mut() {
                breath.next_sample(self.sample_rate);
            }
            self.until_snapshot -= 1;
            if self.until_snapshot == 0 {
                self.until_snapshot = self.snapshot_interval;
                self.publish(self.frame + offset + 1);
            }
        }

        self.frame += frames as u64;
        self.reap();
    }

    fn drain_commands(&mut self) {
        // Only take a voice command when a rejection could still be reported.
        while !self.channels.events.is_full() {
            let Ok(command) = self.channels.commands.pop() else {
                break;
            };
            self.apply(command);
        }

        while let Ok(command) = self.channels.modulation.pop() {
            match command {
                ModCommand::Register(target) => {
                    // A full table leaves the track unmodulated.
                    let _ = self.table.register(target);
                }
                ModCommand::Unregister(track) => self.table.unregister(track),
            }
        }

        while let Ok(command) = self.channels.breathing.pop() {
            let Some(breath) = self.breath.as_mut() else {
                continue;
            };
            match command {
                BreathCommand::Configure {
                    shape,
                    inhale_ratio,
                    trajectory,
                    period,
                } => breath.configure(shape, inhale_ratio, trajectory, period),
                BreathCommand::Reset | BreathCommand::Stop => breath.reset(),
            }
        }
    }

    fn apply(&mut self, command: RenderCommand) {
        match command {
            RenderCommand::Add {
                id,
                voice,
                fade_in_frames,
                stop,
            } => {
                if self.slots.len() >= MAX_TRACKS {
                    let _ = self.channels.events.push(RenderEvent::Rejected { id, voice });
                    return;
                }
                self.slots
                    .push(Slot::new(id, voice, fade_in_frames, stop, self.sample_rate));
            }
            RenderCommand::Remove { id, fade_frames } => {
                if let Some(slot) = self.slot_mut(id) {
                    slot.stop(fade_frames);
                }
            }
            RenderCommand::SetParam {
                id,
                param,
                value,
                smoothing,
            } => {
                let sample_rate = self.sample_rate;
                if let Some(slot) = self.slot_mut(id) {
                    slot.voice.set_param(param, value, smoothing, sample_rate);
                }
            }
            RenderCommand::Configure { id, change } => {
                if let Some(slot) = self.slot_mut(id) {
                    slot.voice.configure(change);
                }
            }
            RenderCommand::MasterGain { target, ramp_secs } => {
                let target = if target.is_nan() { 0.0 } else { target.clamp(0.0, 1.0) };
                let smoothing = if ramp_secs > 0.0 {
                    Smoothing::Linear { duration: ramp_secs }
                } else {
                    Smoothing::Immediate
                };
                self.master.set(target, smoothing, self.sample_rate);
            }
        }
    }

    fn slot_mut(&mut self, id: TrackId) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|slot| slot.id == id)
    }

    fn publish(&mut self, frame: u64) {
        if self.channels.telemetry.is_full() {
            return;
        }
        let breath = self.breath.as_ref().map(BreathingOscillator::snapshot);
        let modulated = match breath {
            Some(snapshot) if !self.table.is_empty() => self.table.evaluate(snapshot.value),
            _ => ModulatedValues::empty(),
        };
        let telemetry = Telemetry {
            frame,
            breath,
            modulated,
            rms: self.meter.rms(),
            peak: self.meter.take_peak(),
            master_gain: self.master.current(),
            voices: self.slots.len(),
        };
        let _ = self.channels.telemetry.push(telemetry);
    }

    fn reap(&mut self) {
        let mut index = 0;
        while index < self.slots.len() {
            if !self.slots[index].is_done() || self.channels.events.is_full() {
                index += 1;
                continue;
            }
            let slot = self.slots.swap_remove(index);
            let _ = self.channels.events.push(RenderEvent::Ended {
                id: slot.id,
                voice: slot.voice,
            });
        }
    }
}
