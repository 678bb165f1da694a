//! Control-thread graph manager.
//!
//! [`Engine`] owns the track registry and everything that runs at control
//! rate: timers, pan automation, modulation polling and the safety monitor.
//! It talks to the [`Renderer`] only through ring buffers, so the two halves
//! can live on different threads (live output) or be driven in lock-step
//! from one loop (offline rendering and tests).

pub mod breathing;
pub mod modulation;
pub mod pan;
pub mod params;
pub mod peal;
pub mod ringing;
pub mod safety;
pub mod scheduler;

use std::collections::{BTreeMap, VecDeque};

use rtrb::{Consumer, Producer, PushError, RingBuffer};
use tracing::{debug, info, warn};

use crate::config::{BreathConfig, EngineConfig};
use crate::dsp::Smoothing;
use crate::graph::BreathSnapshot;
use crate::synth::message::{RenderCommand, RenderEvent, StopPlan, Telemetry};
use crate::synth::modulation::ModParam;
use crate::synth::renderer::{RenderChannels, Renderer};
use crate::voices::{EnsembleVoice, TrackVoice, VoiceParam};
use crate::{EngineError, Result, MAX_TRACKS};

use self::breathing::BreathingHandle;
use self::modulation::{ModulationChannel, PollingChannel, RealtimeChannel};
use self::pan::PanAutomation;
use self::params::{resolve_carrier, UpdateOutcome, VoiceEdit};
use self::ringing::{finish_time, plan_strikes, RenderOptions, RingingSchedule};
use self::safety::{SafetyEvent, SafetyMonitor, SafetyStatus};
use self::scheduler::{EngineTimer, Scheduler, TimerKey, TrackTimer};

pub use self::params::{TrackKind, TrackParams, TrackSpec, TrackUpdate};
pub use crate::synth::TrackId;

const MOD_RING_CAPACITY: usize = 64;
const BREATH_RING_CAPACITY: usize = 16;
const EVENT_RING_CAPACITY: usize = MAX_TRACKS * 2;

/// Something the caller should know about, returned from [`Engine::tick`].
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    /// The track reached the end of its duration or its last strike.
    TrackEnded(TrackId),
    /// The renderer had no free slot; the track was never heard.
    TrackRejected(TrackId),
    Safety(SafetyEvent),
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSummary {
    pub id: TrackId,
    pub kind: TrackKind,
    pub description: String,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineStats {
    pub initialized: bool,
    pub sample_rate: f32,
    /// Frames the renderer has reported so far.
    pub frame: u64,
    /// Audio time in seconds.
    pub time: f64,
    pub master_gain: f32,
    pub rms: f32,
    pub peak: f32,
    pub render_voices: usize,
    pub realtime_modulation: bool,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub breath: Option<BreathSnapshot>,
    pub tracks: Vec<TrackSummary>,
}

enum TrackBody {
    Continuous(TrackParams),
    Ensemble { strikes: usize, title: Option<String> },
}

struct TrackEntry {
    body: TrackBody,
    modulated: bool,
    pan: Option<PanAutomation>,
}

impl TrackEntry {
    fn kind(&self) -> TrackKind {
        match &self.body {
            TrackBody::Continuous(params) => params.kind(),
            TrackBody::Ensemble { .. } => TrackKind::Ringing,
        }
    }

    fn describe(&self) -> String {
        match &self.body {
            TrackBody::Continuous(params) => params.describe(),
            TrackBody::Ensemble { strikes, title } => match title {
                Some(title) => format!("change ringing: {title} ({strikes} strikes)"),
                None => format!("change ringing ({strikes} strikes)"),
            },
        }
    }
}

/// Control-side ends of the rings plus the state that only exists once the
/// rendering context does.
struct Context {
    sample_rate: f32,
    commands: Producer<RenderCommand>,
    telemetry: Consumer<Telemetry>,
    events: Consumer<RenderEvent>,
    /// Commands that found the ring full, replayed in order on the next tick.
    backlog: VecDeque<RenderCommand>,
    breathing: BreathingHandle,
    modulation: Box<dyn ModulationChannel>,
    frame: u64,
    rms: f32,
    peak: f32,
    master_gain: f32,
    render_voices: usize,
}

impl Context {
    fn now(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    fn frames(&self, seconds: f32) -> u32 {
        (seconds.max(0.0) * self.sample_rate).round() as u32
    }

    fn flush(&mut self) -> bool {
        while let Some(command) = self.backlog.pop_front() {
            if let Err(PushError::Full(command)) = self.commands.push(command) {
                self.backlog.push_front(command);
                return false;
            }
        }
        true
    }

    fn send(&mut self, command: RenderCommand) {
        if !self.flush() {
            self.backlog.push_back(command);
            return;
        }
        if let Err(PushError::Full(command)) = self.commands.push(command) {
            debug!("render command ring full, deferring");
            self.backlog.push_back(command);
        }
    }

    fn set_param(&mut self, id: TrackId, param: VoiceParam, value: f32, smoothing: Smoothing) {
        self.send(RenderCommand::SetParam {
            id,
            param,
            value,
            smoothing,
        });
    }
}

/// The audio graph manager.
///
/// ```no_run
/// use biosyn_dsp::engine::{Engine, TrackParams, TrackSpec};
/// use biosyn_dsp::EngineConfig;
///
/// let mut engine = Engine::new(EngineConfig::default());
/// let mut renderer = engine.init(48_000.0)?;
/// let id = engine.start(TrackSpec::new(TrackParams::binaural(200.0, 10.0)))?;
///
/// let (mut left, mut right) = (vec![0.0; 512], vec![0.0; 512]);
/// renderer.process(&mut left, &mut right);
/// engine.tick();
/// engine.stop(id);
/// # Ok::<(), biosyn_dsp::EngineError>(())
/// ```
pub struct Engine {
    config: EngineConfig,
    context: Option<Context>,
    tracks: BTreeMap<TrackId, TrackEntry>,
    next_id: u64,
    scheduler: Scheduler,
    safety: SafetyMonitor,
    /// Master gain the engine is steering towards.
    master_target: f32,
    emergency_applied: bool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let safety = SafetyMonitor::new(config.safety.clone());
        let master_target = config.master_gain.clamp(0.0, 1.0);
        Self {
            config,
            context: None,
            tracks: BTreeMap::new(),
            next_id: 1,
            scheduler: Scheduler::new(),
            safety,
            master_target,
            emergency_applied: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    /// Create the rendering context. The returned renderer must be driven
    /// by the audio callback (or an offline loop) from now on.
    pub fn init(&mut self, sample_rate: f32) -> Result<Renderer> {
        if self.context.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }
        let sample_rate = if sample_rate.is_finite() && sample_rate > 0.0 {
            sample_rate
        } else {
            warn!(sample_rate, "invalid sample rate, using configured rate");
            self.config.sample_rate.max(1) as f32
        };

        let (commands, command_rx) = RingBuffer::new(self.config.command_capacity.max(16));
        let (mod_tx, mod_rx) = RingBuffer::new(MOD_RING_CAPACITY);
        let (breath_tx, breath_rx) = RingBuffer::new(BREATH_RING_CAPACITY);
        let (telemetry_tx, telemetry) = RingBuffer::new(self.config.telemetry_capacity.max(4));
        let (events_tx, events) = RingBuffer::new(EVENT_RING_CAPACITY);

        let realtime = self.config.modulation.realtime;
        let (breathing, modulation, render_breath) = if realtime {
            (
                BreathingHandle::realtime(&self.config.breathing, breath_tx),
                Box::new(RealtimeChannel::new(mod_tx)) as Box<dyn ModulationChannel>,
                Some(breathing::oscillator(&self.config.breathing)),
            )
        } else {
            (
                BreathingHandle::local(&self.config.breathing, sample_rate, 0.0),
                Box::new(PollingChannel::new()) as Box<dyn ModulationChannel>,
                None,
            )
        };

        let renderer = Renderer::new(
            sample_rate,
            &self.config,
            RenderChannels {
                commands: command_rx,
                modulation: mod_rx,
                breathing: breath_rx,
                telemetry: telemetry_tx,
                events: events_tx,
            },
            render_breath,
        );

        self.context = Some(Context {
            sample_rate,
            commands,
            telemetry,
            events,
            backlog: VecDeque::new(),
            breathing,
            modulation,
            frame: 0,
            rms: 0.0,
            peak: 0.0,
            master_gain: self.master_target,
            render_voices: 0,
        });

        self.scheduler.schedule_every(
            TimerKey::Engine(EngineTimer::ModulationPoll),
            0.0,
            self.config.modulation.poll_interval_secs as f64,
        );
        self.scheduler.schedule_every(
            TimerKey::Engine(EngineTimer::SafetyCheck),
            0.0,
            self.config.safety.check_interval_secs as f64,
        );

        info!(sample_rate, realtime_modulation = realtime, "audio context initialized");
        Ok(renderer)
    }

    /// Tear the rendering context down so `init` can run again. Tracks,
    /// timers and the current session go with it.
    pub fn close(&mut self) {
        let now = self.now();
        if self.context.take().is_none() {
            return;
        }
        self.tracks.clear();
        self.scheduler.clear();
        self.safety.end_session(now);
        self.emergency_applied = false;
        info!("audio context closed");
    }

    fn context(&mut self) -> Result<&mut Context> {
        self.context.as_mut().ok_or(EngineError::NotInitialized)
    }

    /// Audio time in seconds, as last reported by the renderer.
    pub fn now(&self) -> f64 {
        self.context.as_ref().map(Context::now).unwrap_or(0.0)
    }

    fn allocate_id(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Start a track. Out-of-range parameters are clamped, never rejected.
    pub fn start(&mut self, spec: TrackSpec) -> Result<TrackId> {
        let fade_in_secs = self.config.fade_in_secs;
        let stop_fade_secs = self.config.stop_fade_secs;
        let teardown = self.config.ringing_teardown_secs as f64;
        let pan_interval = self.config.pan.interval_secs as f64;

        let shutting_down = self.is_shutting_down();
        let ctx = self.context.as_mut().ok_or(EngineError::NotInitialized)?;
        if shutting_down {
            warn!("session limit fade in progress, track not started");
            return Err(EngineError::ShuttingDown);
        }
        if !ctx.flush() {
            return Err(EngineError::QueueFull);
        }
        let now = ctx.now();
        let params = spec.params.sanitized();

        let pan = match &params {
            TrackParams::Beat(beat) => Some(PanAutomation::new(beat.pan, beat.mix, now)),
            _ => None,
        };
        let pans = pan
            .map(|pan| pan.positions(now, ctx.breathing.sample()))
            .unwrap_or((0.0, 0.0));
        let voice = Box::new(params.build_voice(pans));

        let stop = spec
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|duration| {
                let total = ctx.frames(duration) as u64;
                let fade_frames = (ctx.frames(stop_fade_secs) as u64).min(total);
                StopPlan {
                    fade_start: total - fade_frames,
                    fade_frames: fade_frames as u32,
                }
            });

        let fade_in_frames = ctx.frames(fade_in_secs);
        let id = TrackId(self.next_id);
        let add = RenderCommand::Add {
            id,
            voice,
            fade_in_frames,
            stop,
        };
        if ctx.commands.push(add).is_err() {
            warn!(%id, "render command ring full, track not started");
            return Err(EngineError::QueueFull);
        }

        let modulated = !spec.modulation.is_empty()
            && ctx.modulation.register(id, &spec.modulation);

        self.allocate_id();
        if self.tracks.is_empty() {
            self.safety.start_session(now);
        }

        if let Some(duration) = spec.duration.filter(|d| d.is_finite() && *d > 0.0) {
            self.scheduler.schedule_at(
                TimerKey::Track(id, TrackTimer::Expire),
                now + duration as f64 + teardown,
            );
        }
        if pan.is_some_and(|pan| pan.is_animated()) {
            self.scheduler
                .schedule_every(TimerKey::Track(id, TrackTimer::Pan), now, pan_interval);
        }

        info!(%id, kind = params.kind().name(), description = %params.describe(), "track started");
        self.tracks.insert(
            id,
            TrackEntry {
                body: TrackBody::Continuous(params),
                modulated,
                pan,
            },
        );
        Ok(id)
    }

    /// Apply a partial update. Returns false for unknown tracks.
    pub fn update(&mut self, id: TrackId, update: TrackUpdate) -> bool {
        let smoothing = Smoothing::Exponential {
            time_constant: self.config.modulation.smoothing_secs,
        };
        let pan_interval = self.config.pan.interval_secs as f64;
        let Some(ctx) = self.context.as_mut() else {
            return false;
        };
        let Some(entry) = self.tracks.get_mut(&id) else {
            debug!(%id, "update for unknown track ignored");
            return false;
        };
        let now = ctx.now();

        let outcome = match &mut entry.body {
            TrackBody::Continuous(params) => params.apply_update(&update),
            TrackBody::Ensemble { .. } => UpdateOutcome {
                edits: update
                    .gain
                    .map(|gain| VoiceEdit::Param(VoiceParam::Gain, crate::voices::clamp_gain(gain)))
                    .into_iter()
                    .collect(),
                pan_changed: false,
            },
        };

        for edit in outcome.edits {
            match edit {
                VoiceEdit::Param(param, value) => ctx.set_param(id, param, value, smoothing),
                VoiceEdit::Change(change) => ctx.send(RenderCommand::Configure { id, change }),
            }
        }

        if outcome.pan_changed {
            if let TrackBody::Continuous(TrackParams::Beat(beat)) = &entry.body {
                // A new mode starts from scratch; the old mode's timer goes first.
                self.scheduler.cancel(TimerKey::Track(id, TrackTimer::Pan));
                let pan = PanAutomation::new(beat.pan, beat.mix, now);
                let (left, right) = pan.positions(now, ctx.breathing.sample());
                ctx.set_param(id, VoiceParam::PanLeft, left, smoothing);
                ctx.set_param(id, VoiceParam::PanRight, right, smoothing);
                if pan.is_animated() {
                    self.scheduler
                        .schedule_every(TimerKey::Track(id, TrackTimer::Pan), now, pan_interval);
                }
                entry.pan = Some(pan);
            }
        }

        if let Some(params) = &update.modulation {
            if params.is_empty() {
                ctx.modulation.unregister(id);
                entry.modulated = false;
            } else {
                entry.modulated = ctx.modulation.register(id, params);
            }
        }

        debug!(%id, ?update, "track updated");
        true
    }

    /// Stop a track with the configured fade. Stopping an unknown or already
    /// stopped track is a no-op that returns false.
    pub fn stop(&mut self, id: TrackId) -> bool {
        let fade = self.config.stop_fade_secs;
        self.remove_track(id, Some(fade))
    }

    /// Stop every track. Returns how many were stopped.
    pub fn stop_all(&mut self) -> usize {
        let ids: Vec<TrackId> = self.tracks.keys().copied().collect();
        let stopped = ids.into_iter().filter(|id| self.stop(*id)).count();
        if stopped > 0 {
            info!(stopped, "all tracks stopped");
        }
        stopped
    }

    /// Tear a track down. `fade` of None means the renderer already let go of
    /// the voice.
    fn remove_track(&mut self, id: TrackId, fade: Option<f32>) -> bool {
        let Some(ctx) = self.context.as_mut() else {
            return false;
        };
        if !self.tracks.contains_key(&id) {
            return false;
        }

        // Modulation, pan automation, pending callbacks, then the nodes.
        ctx.modulation.unregister(id);
        self.scheduler.cancel(TimerKey::Track(id, TrackTimer::Pan));
        self.scheduler.cancel_track(id);
        if let Some(fade) = fade {
            let fade_frames = ctx.frames(fade);
            ctx.send(RenderCommand::Remove { id, fade_frames });
        }
        let now = ctx.now();
        self.tracks.remove(&id);
        debug!(%id, "track removed");

        if self.tracks.is_empty() {
            self.safety.end_session(now);
        }
        true
    }

    /// Schedule a change-ringing performance as one track.
    ///
    /// Returns `Ok(None)` when no event is audible.
    pub fn render_ringing(
        &mut self,
        schedule: &RingingSchedule,
        options: &RenderOptions,
    ) -> Result<Option<TrackId>> {
        let teardown = self.config.ringing_teardown_secs as f64;
        let shutting_down = self.is_shutting_down();
        let ctx = self.context.as_mut().ok_or(EngineError::NotInitialized)?;
        if shutting_down {
            warn!("session limit fade in progress, ringing not started");
            return Err(EngineError::ShuttingDown);
        }

        let planned = plan_strikes(schedule, options);
        if planned.is_empty() {
            warn!(
                events = schedule.events.len(),
                "change ringing has no audible strikes, nothing rendered"
            );
            return Ok(None);
        }
        if !ctx.flush() {
            return Err(EngineError::QueueFull);
        }

        let timing = schedule.timing();
        let finish = finish_time(&planned, timing);
        let strikes = planned
            .iter()
            .map(|strike| strike.to_strike(ctx.sample_rate, timing))
            .collect();
        let voice = EnsembleVoice::new(strikes, options.waveform, 1.0);

        let id = TrackId(self.next_id);
        let add = RenderCommand::Add {
            id,
            voice: Box::new(TrackVoice::Ensemble(voice)),
            fade_in_frames: 0,
            stop: None,
        };
        if ctx.commands.push(add).is_err() {
            return Err(EngineError::QueueFull);
        }
        let now = ctx.now();
        self.allocate_id();

        if self.tracks.is_empty() {
            self.safety.start_session(now);
        }
        self.scheduler.schedule_at(
            TimerKey::Track(id, TrackTimer::Expire),
            now + finish + teardown,
        );
        info!(%id, strikes = planned.len(), stage = schedule.effective_stage(), finish, "change ringing scheduled");
        self.tracks.insert(
            id,
            TrackEntry {
                body: TrackBody::Ensemble {
                    strikes: planned.len(),
                    title: schedule.metadata.get("title").cloned(),
                },
                modulated: false,
                pan: None,
            },
        );
        Ok(Some(id))
    }

    /// Ramp the master gain. This is also the level a forced stop restores.
    pub fn set_master_gain(&mut self, gain: f32, ramp_secs: f32) -> Result<()> {
        let target = crate::voices::clamp_gain(gain);
        let ctx = self.context()?;
        ctx.send(RenderCommand::MasterGain {
            target,
            ramp_secs: ramp_secs.max(0.0),
        });
        self.master_target = target;
        self.config.master_gain = target;
        Ok(())
    }

    pub fn configure_breathing(&mut self, config: BreathConfig) -> Result<()> {
        self.context()?.breathing.configure(&config);
        self.config.breathing = config;
        Ok(())
    }

    pub fn reset_breathing(&mut self) -> Result<()> {
        self.context()?.breathing.reset();
        Ok(())
    }

    pub fn breathing(&self) -> Option<&BreathingHandle> {
        self.context.as_ref().map(|ctx| &ctx.breathing)
    }

    /// Latest modulated values of a track, whichever path computes them.
    pub fn modulated_values(&self, id: TrackId) -> Option<BTreeMap<ModParam, f32>> {
        self.context.as_ref()?.modulation.modulated_values(id)
    }

    pub fn is_realtime_modulation(&self) -> bool {
        self.context
            .as_ref()
            .is_some_and(|ctx| ctx.modulation.is_realtime())
    }

    /// Base (unmodulated) parameters of a continuous track.
    pub fn track_params(&self, id: TrackId) -> Option<&TrackParams> {
        match &self.tracks.get(&id)?.body {
            TrackBody::Continuous(params) => Some(params),
            TrackBody::Ensemble { .. } => None,
        }
    }

    /// Whether the session-limit fade is running. New tracks are refused
    /// until it completes.
    pub fn is_shutting_down(&self) -> bool {
        self.scheduler
            .is_scheduled(TimerKey::Engine(EngineTimer::ForcedStop))
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.tracks.contains_key(&id)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn safety_status(&self) -> SafetyStatus {
        self.safety.status()
    }

    pub fn stats(&self) -> EngineStats {
        let tracks = self
            .tracks
            .iter()
            .map(|(id, entry)| TrackSummary {
                id: *id,
                kind: entry.kind(),
                description: entry.describe(),
            })
            .collect();
        let Some(ctx) = self.context.as_ref() else {
            return EngineStats {
                tracks,
                ..EngineStats::default()
            };
        };
        EngineStats {
            initialized: true,
            sample_rate: ctx.sample_rate,
            frame: ctx.frame,
            time: ctx.now(),
            master_gain: ctx.master_gain,
            rms: ctx.rms,
            peak: ctx.peak,
            render_voices: ctx.render_voices,
            realtime_modulation: ctx.modulation.is_realtime(),
            breath: Some(ctx.breathing.snapshot()),
            tracks,
        }
    }

    /// Drive the control side: read what the renderer reported, then run
    /// every timer that is due at the current audio time.
    ///
    /// Call it regularly (every block offline, every few milliseconds live).
    pub fn tick(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        if self.context.is_none() {
            return events;
        }
        self.drain_telemetry();
        self.drain_render_events(&mut events);

        let now = self.now();
        if let Some(ctx) = self.context.as_mut() {
            ctx.flush();
            ctx.breathing.flush();
            ctx.modulation.flush();
            if !ctx.breathing.is_realtime() {
                ctx.breathing.advance_to(now);
                let snapshot = ctx.breathing.snapshot();
                ctx.modulation.observe(&snapshot, None);
            }
        }

        for key in self.scheduler.due(now) {
            match key {
                TimerKey::Track(id, TrackTimer::Expire) => {
                    if self.remove_track(id, Some(0.0)) {
                        events.push(EngineEvent::TrackEnded(id));
                    }
                }
                TimerKey::Track(id, TrackTimer::Pan) => self.pan_tick(id, now),
                TimerKey::Engine(EngineTimer::ModulationPoll) => self.apply_modulation(),
                TimerKey::Engine(EngineTimer::SafetyCheck) => self.safety_check(now, &mut events),
                TimerKey::Engine(EngineTimer::ForcedStop) => self.forced_stop(),
            }
        }
        events
    }

    fn drain_telemetry(&mut self) {
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        let mut lost_breathing = false;
        while let Ok(telemetry) = ctx.telemetry.pop() {
            ctx.frame = ctx.frame.max(telemetry.frame);
            ctx.rms = telemetry.rms;
            ctx.peak = telemetry.peak;
            ctx.master_gain = telemetry.master_gain;
            ctx.render_voices = telemetry.voices;
            match telemetry.breath {
                Some(snapshot) => {
                    ctx.breathing.observe(snapshot);
                    ctx.modulation.observe(&snapshot, Some(&telemetry.modulated));
                }
                None => lost_breathing |= ctx.breathing.is_realtime(),
            }
        }
        if lost_breathing {
            self.fall_back_to_polling();
        }
    }

    /// Move breathing and modulation to the control thread, keeping every
    /// registration.
    fn fall_back_to_polling(&mut self) {
        let breath_config = self.config.breathing.clone();
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        warn!("renderer has no breathing processor, falling back to control-thread modulation");
        let now = ctx.now();
        ctx.breathing.fall_back(&breath_config, ctx.sample_rate, now);
        let mut polling = PollingChannel::new();
        for (track, params) in ctx.modulation.registrations() {
            polling.register(track, &params);
        }
        ctx.modulation = Box::new(polling);
    }

    fn drain_render_events(&mut self, events: &mut Vec<EngineEvent>) {
        let mut ended = Vec::new();
        let mut rejected = Vec::new();
        if let Some(ctx) = self.context.as_mut() {
            while let Ok(event) = ctx.events.pop() {
                // Dropping the voice here keeps deallocation off the audio thread.
                match event {
                    RenderEvent::Ended { id, voice } => {
                        drop(voice);
                        ended.push(id);
                    }
                    RenderEvent::Rejected { id, voice } => {
                        drop(voice);
                        rejected.push(id);
                    }
                }
            }
        }
        for id in ended {
            if self.remove_track(id, None) {
                info!(%id, "track ended");
                events.push(EngineEvent::TrackEnded(id));
            }
        }
        for id in rejected {
            warn!(%id, max = MAX_TRACKS, "renderer full, track rejected");
            if self.remove_track(id, None) {
                events.push(EngineEvent::TrackRejected(id));
            }
        }
    }

    fn pan_tick(&mut self, id: TrackId, now: f64) {
        let smoothing = Smoothing::Exponential {
            time_constant: self.config.pan.smoothing_secs,
        };
        let (Some(ctx), Some(entry)) = (self.context.as_mut(), self.tracks.get(&id)) else {
            // The track went away between scheduling and firing.
            self.scheduler.cancel(TimerKey::Track(id, TrackTimer::Pan));
            return;
        };
        let Some(pan) = entry.pan else {
            self.scheduler.cancel(TimerKey::Track(id, TrackTimer::Pan));
            return;
        };
        let (left, right) = pan.positions(now, ctx.breathing.sample());
        ctx.set_param(id, VoiceParam::PanLeft, left, smoothing);
        ctx.set_param(id, VoiceParam::PanRight, right, smoothing);
    }

    /// Push the latest modulated values to every modulated track.
    fn apply_modulation(&mut self) {
        let smoothing = Smoothing::Exponential {
            time_constant: self.config.modulation.smoothing_secs,
        };
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        let now = ctx.now();
        let breath = ctx.breathing.sample();

        for (id, entry) in self.tracks.iter_mut() {
            if !entry.modulated {
                continue;
            }
            let Some(values) = ctx.modulation.modulated_values(*id) else {
                continue;
            };
            let id = *id;

            if let Some(gain) = values.get(&ModParam::Gain) {
                ctx.set_param(id, VoiceParam::Gain, crate::voices::clamp_gain(*gain), smoothing);
            }

            match &entry.body {
                TrackBody::Continuous(TrackParams::Beat(beat)) => {
                    let base_mod = values.get(&ModParam::Base).or(values.get(&ModParam::Frequency));
                    let beat_mod = values.get(&ModParam::Beat);
                    if base_mod.is_some() || beat_mod.is_some() {
                        let current = beat.resolved();
                        let resolved = resolve_carrier(
                            base_mod.copied().unwrap_or(current.base),
                            beat_mod.copied().unwrap_or(current.beat),
                        );
                        ctx.set_param(id, VoiceParam::LeftFrequency, resolved.left, smoothing);
                        ctx.set_param(id, VoiceParam::RightFrequency, resolved.right, smoothing);
                    }
                    if let (Some(offset), Some(pan)) = (values.get(&ModParam::Pan), entry.pan.as_mut()) {
                        pan.set_offset(*offset);
                        let (left, right) = pan.positions(now, breath);
                        ctx.set_param(id, VoiceParam::PanLeft, left, smoothing);
                        ctx.set_param(id, VoiceParam::PanRight, right, smoothing);
                    }
                }
                TrackBody::Continuous(_) => {
                    if let Some(frequency) = values.get(&ModParam::Frequency).or(values.get(&ModParam::Base)) {
                        ctx.set_param(id, VoiceParam::Frequency, *frequency, smoothing);
                    }
                    if let Some(rate) = values.get(&ModParam::PulseRate) {
                        ctx.set_param(id, VoiceParam::PulseRate, *rate, smoothing);
                    }
                    if let Some(pan) = values.get(&ModParam::Pan) {
                        ctx.set_param(id, VoiceParam::Pan, *pan, smoothing);
                    }
                }
                TrackBody::Ensemble { .. } => {}
            }
        }
    }

    fn safety_check(&mut self, now: f64, events: &mut Vec<EngineEvent>) {
        let rms = self.context.as_ref().map(|ctx| ctx.rms).unwrap_or(0.0);
        for event in self.safety.check(now, rms) {
            self.intervene(event, now);
            events.push(EngineEvent::Safety(event));
        }
    }

    fn intervene(&mut self, event: SafetyEvent, now: f64) {
        let safety = self.config.safety.clone();
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        match event {
            SafetyEvent::VolumeWarning { rms } => {
                warn!(rms, threshold = safety.volume_warning, "output level high");
            }
            SafetyEvent::VolumeEmergency { rms } => {
                if self.emergency_applied {
                    return;
                }
                self.emergency_applied = true;
                let reduction = safety.emergency_gain_reduction.clamp(0.0, 1.0);
                let target = ctx.master_gain * (1.0 - reduction);
                warn!(rms, target, "output level critical, reducing master gain");
                ctx.send(RenderCommand::MasterGain {
                    target,
                    ramp_secs: safety.emergency_ramp_secs,
                });
            }
            SafetyEvent::EmergencyCleared => {
                info!("output level back below emergency threshold");
                self.emergency_applied = false;
            }
            SafetyEvent::DurationWarning { elapsed } => {
                warn!(elapsed, limit = safety.duration_limit_secs, "long listening session");
            }
            SafetyEvent::DurationLimit { elapsed } => {
                warn!(elapsed, "session limit reached, fading out and stopping");
                ctx.send(RenderCommand::MasterGain {
                    target: 0.0,
                    ramp_secs: safety.shutdown_fade_secs,
                });
                self.scheduler.schedule_at(
                    TimerKey::Engine(EngineTimer::ForcedStop),
                    now + safety.shutdown_fade_secs.max(0.0) as f64,
                );
            }
        }
    }

    /// End of the duration-limit fade: silence everything, then restore the
    /// master gain for whatever is started next.
    fn forced_stop(&mut self) {
        let ids: Vec<TrackId> = self.tracks.keys().copied().collect();
        for id in &ids {
            self.remove_track(*id, Some(0.0));
        }
        let target = self.master_target;
        if let Some(ctx) = self.context.as_mut() {
            ctx.send(RenderCommand::MasterGain {
                target,
                ramp_secs: 0.0,
            });
            let now = ctx.now();
            self.safety.end_session(now);
        }
        self.emergency_applied = false;
        info!(stopped = ids.len(), "forced stop complete");
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::modulation::ModulationParam;

    fn engine() -> (Engine, Renderer) {
        let mut engine = Engine::default();
        let renderer = engine.init(48_000.0).unwrap();
        (engine, renderer)
    }

    fn run(engine: &mut Engine, renderer: &mut Renderer, seconds: f32) -> Vec<EngineEvent> {
        let mut left = vec![0.0; 480];
        let mut right = vec![0.0; 480];
        let mut events = Vec::new();
        let blocks = (seconds * 100.0).round() as usize;
        for _ in 0..blocks {
            renderer.process(&mut left, &mut right);
            events.extend(engine.tick());
        }
        events
    }

    #[test]
    fn start_before_init_fails() {
        let mut engine = Engine::default();
        assert!(matches!(
            engine.start(TrackSpec::new(TrackParams::tone(440.0))),
            Err(EngineError::NotInitialized)
        ));
    }

    #[test]
    fn init_twice_fails() {
        let (mut engine, _renderer) = engine();
        assert!(matches!(engine.init(48_000.0), Err(EngineError::AlreadyInitialized)));
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut engine, mut renderer) = engine();
        let id = engine.start(TrackSpec::new(TrackParams::tone(440.0))).unwrap();
        run(&mut engine, &mut renderer, 0.1);

        assert!(engine.stop(id));
        assert_eq!(engine.track_count(), 0);
        assert!(!engine.stop(id));
        assert_eq!(engine.track_count(), 0);
    }

    #[test]
    fn stop_cancels_timers_and_modulation() {
        let (mut engine, _renderer) = engine();
        let spec = TrackSpec::new(TrackParams::binaural(200.0, 10.0))
            .with_duration(30.0)
            .with_modulation(vec![ModulationParam::new(ModParam::Gain, 0.3, 0.1, 0.0, 1.0)]);
        let id = engine.start(spec).unwrap();
        assert!(engine.scheduler.is_scheduled(TimerKey::Track(id, TrackTimer::Expire)));
        assert!(engine.modulated_values(id).is_some());

        engine.stop(id);
        assert!(!engine.scheduler.is_scheduled(TimerKey::Track(id, TrackTimer::Expire)));
        assert!(engine.modulated_values(id).is_none());
    }

    #[test]
    fn lost_breathing_processor_falls_back_to_polling() {
        let (mut engine, mut renderer) = engine();
        let mut breathing = engine.config().breathing.clone();
        breathing.period = 2.0;
        engine.configure_breathing(breathing).unwrap();
        let gain = ModulationParam::new(ModParam::Gain, 0.5, 0.4, 0.0, 1.0);
        let id = engine
            .start(TrackSpec::new(TrackParams::tone(300.0)).with_modulation(vec![gain]))
            .unwrap();
        run(&mut engine, &mut renderer, 0.1);
        assert!(engine.is_realtime_modulation());

        renderer.detach_breathing();
        run(&mut engine, &mut renderer, 0.1);
        assert!(!engine.is_realtime_modulation());
        assert!(!engine.breathing().unwrap().is_realtime());

        // The registration moved across and now follows the local breath.
        let mut seen = Vec::new();
        for _ in 0..100 {
            run(&mut engine, &mut renderer, 0.01);
            let signal = engine.breathing().unwrap().value();
            let value = engine.modulated_values(id).unwrap()[&ModParam::Gain];
            assert_eq!(value, gain.value_at(signal));
            seen.push(value);
        }
        let (lo, hi) = seen
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        assert!(hi - lo > 0.3);
    }

    #[test]
    fn pan_timer_follows_the_mode() {
        use super::pan::{PanConfig, PanMode};

        let (mut engine, mut renderer) = engine();
        let sine = PanConfig::with_mode(PanMode::SineLfo {
            frequency: 0.5,
            phase: 0.0,
        });
        let id = engine
            .start(TrackSpec::new(TrackParams::binaural(200.0, 10.0).with_pan(sine)))
            .unwrap();
        let pan_timer = TimerKey::Track(id, TrackTimer::Pan);
        assert!(engine.scheduler.is_scheduled(pan_timer));
        run(&mut engine, &mut renderer, 0.1);

        let still = TrackUpdate {
            pan_automation: Some(PanConfig::default()),
            ..TrackUpdate::default()
        };
        assert!(engine.update(id, still));
        assert!(!engine.scheduler.is_scheduled(pan_timer));

        let breathing = TrackUpdate {
            pan_automation: Some(PanConfig::with_mode(PanMode::BreathingSync)),
            ..TrackUpdate::default()
        };
        assert!(engine.update(id, breathing));
        assert!(engine.scheduler.is_scheduled(pan_timer));

        assert!(engine.stop(id));
        assert!(!engine.scheduler.is_scheduled(pan_timer));
    }

    #[test]
    fn close_allows_a_fresh_init() {
        let (mut engine, mut renderer) = engine();
        engine
            .start(TrackSpec::new(TrackParams::tone(440.0)).with_duration(5.0))
            .unwrap();
        run(&mut engine, &mut renderer, 0.1);
        assert!(engine.safety_status().session_active);

        engine.close();
        assert!(!engine.is_initialized());
        assert_eq!(engine.track_count(), 0);
        assert!(engine.scheduler.is_empty());
        assert!(!engine.safety_status().session_active);
        // Closing twice is harmless.
        engine.close();

        let mut renderer = engine.init(44_100.0).unwrap();
        let id = engine.start(TrackSpec::new(TrackParams::tone(440.0))).unwrap();
        run(&mut engine, &mut renderer, 0.1);
        assert!(engine.contains(id));
        assert_eq!(engine.stats().render_voices, 1);
    }

    #[test]
    fn starts_are_refused_during_the_limit_fade() {
        let mut config = EngineConfig::default();
        config.safety.duration_warning_secs = 0.2;
        config.safety.duration_limit_secs = 0.3;
        config.safety.shutdown_fade_secs = 0.5;
        let mut engine = Engine::new(config);
        let mut renderer = engine.init(48_000.0).unwrap();
        engine
            .start(TrackSpec::new(TrackParams::tone(440.0).with_gain(0.1)))
            .unwrap();

        let events = run(&mut engine, &mut renderer, 0.45);
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::Safety(SafetyEvent::DurationLimit { .. }))));
        assert!(engine.is_shutting_down());
        assert!(matches!(
            engine.start(TrackSpec::new(TrackParams::tone(330.0))),
            Err(EngineError::ShuttingDown)
        ));

        run(&mut engine, &mut renderer, 0.6);
        assert!(!engine.is_shutting_down());
        assert_eq!(engine.track_count(), 0);

        // Once the fade is done a new session plays at full level.
        let id = engine.start(TrackSpec::new(TrackParams::tone(330.0))).unwrap();
        run(&mut engine, &mut renderer, 0.2);
        assert!(engine.contains(id));
        assert!((engine.stats().master_gain - 1.0).abs() < 1e-6);
    }

    #[test]
    fn peak_reports_the_latest_block() {
        let (mut engine, mut renderer) = engine();
        let id = engine
            .start(TrackSpec::new(TrackParams::tone(440.0).with_gain(0.8)))
            .unwrap();
        run(&mut engine, &mut renderer, 0.3);
        let loud = engine.stats().peak;
        assert!(loud > 0.1);

        engine.stop(id);
        run(&mut engine, &mut renderer, 0.3);
        assert_eq!(engine.stats().peak, 0.0);
    }

    #[test]
    fn ids_are_unique() {
        let (mut engine, _renderer) = engine();
        let a = engine.start(TrackSpec::new(TrackParams::tone(440.0))).unwrap();
        let b = engine.start(TrackSpec::new(TrackParams::tone(440.0))).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn session_follows_registry() {
        let (mut engine, mut renderer) = engine();
        assert!(!engine.safety_status().session_active);
        let id = engine.start(TrackSpec::new(TrackParams::tone(440.0))).unwrap();
        assert!(engine.safety_status().session_active);
        run(&mut engine, &mut renderer, 0.2);
        engine.stop(id);
        assert!(!engine.safety_status().session_active);
    }
}
