//! Track parameters: validation, carrier/beat resolution and partial updates.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::noise::NoiseColor;
use crate::dsp::oscillator::OscillatorWaveform;
use crate::dsp::pan::clamp_pan;
use crate::engine::pan::PanConfig;
use crate::graph::oscillator::{clamp_frequency, AUDIBLE_RANGE, CARRIER_RANGE};
use crate::graph::pulse::{clamp_duty, clamp_rate};
use crate::synth::modulation::ModulationParam;
use crate::voices::{
    clamp_gain, BeatVoice, HarmonicVoice, IsochronicVoice, MixMode, NoiseVoice, ToneVoice,
    TrackVoice, VoiceChange, VoiceParam, MARTIGLI_RATIOS,
};

/*
Carrier and Beat
================

A beat pair can be described two ways:

  carrier   base = 200, beat = 10   →  left = 195, right = 205
  absolute  left = 195, right = 205 →  base = 200, beat = 10

    left  = base - beat / 2        base = (left + right) / 2
    right = base + beat / 2        beat = |right - left|

Whichever form the caller used last is the one kept; the other is derived.
Frequencies are clamped to the carrier range (20..4000 Hz) and the beat to
0..400 Hz, so the two forms agree exactly except where a clamp bites.
*/

pub const BEAT_RANGE: (f32, f32) = (0.0, 400.0);

pub fn clamp_beat(beat: f32) -> f32 {
    if beat.is_nan() {
        BEAT_RANGE.0
    } else {
        beat.clamp(BEAT_RANGE.0, BEAT_RANGE.1)
    }
}

/// How the frequencies of a beat pair were specified.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeatFrequencies {
    Carrier { base: f32, beat: f32 },
    Absolute { left: f32, right: f32 },
}

/// Both views of a beat pair, after clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedBeat {
    pub base: f32,
    pub beat: f32,
    pub left: f32,
    pub right: f32,
}

impl BeatFrequencies {
    pub fn resolve(self) -> ResolvedBeat {
        match self {
            BeatFrequencies::Carrier { base, beat } => resolve_carrier(base, beat),
            BeatFrequencies::Absolute { left, right } => resolve_absolute(left, right),
        }
    }
}

pub fn resolve_carrier(base: f32, beat: f32) -> ResolvedBeat {
    let base = clamp_frequency(base, CARRIER_RANGE);
    let beat = clamp_beat(beat);
    ResolvedBeat {
        base,
        beat,
        left: clamp_frequency(base - beat / 2.0, CARRIER_RANGE),
        right: clamp_frequency(base + beat / 2.0, CARRIER_RANGE),
    }
}

pub fn resolve_absolute(left: f32, right: f32) -> ResolvedBeat {
    let left = clamp_frequency(left, CARRIER_RANGE);
    let right = clamp_frequency(right, CARRIER_RANGE);
    let base = (left + right) / 2.0;
    let beat = (right - left).abs();
    if beat > BEAT_RANGE.1 {
        return resolve_carrier(base, beat);
    }
    ResolvedBeat {
        base,
        beat,
        left,
        right,
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct ToneParams {
    pub waveform: OscillatorWaveform,
    pub frequency: f32,
    pub gain: f32,
    pub pan: f32,
}

impl Default for ToneParams {
    fn default() -> Self {
        Self {
            waveform: OscillatorWaveform::Sine,
            frequency: 440.0,
            gain: 0.3,
            pan: 0.0,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct BeatParams {
    pub frequencies: BeatFrequencies,
    pub mix: MixMode,
    pub gain: f32,
    pub pan: PanConfig,
}

impl BeatParams {
    pub fn resolved(&self) -> ResolvedBeat {
        self.frequencies.resolve()
    }
}

impl Default for BeatParams {
    fn default() -> Self {
        Self {
            frequencies: BeatFrequencies::Carrier {
                base: 200.0,
                beat: 10.0,
            },
            mix: MixMode::Dichotic,
            gain: 0.3,
            pan: PanConfig::default(),
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct IsochronicParams {
    pub frequency: f32,
    pub pulse_rate: f32,
    pub duty_cycle: f32,
    pub gain: f32,
    pub pan: f32,
}

impl Default for IsochronicParams {
    fn default() -> Self {
        Self {
            frequency: 180.0,
            pulse_rate: 12.0,
            duty_cycle: 0.5,
            gain: 0.3,
            pan: 0.0,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicParams {
    pub fundamental: f32,
    /// Partial ratios over the fundamental.
    pub ratios: Vec<f32>,
    pub gain: f32,
    pub pan: f32,
}

impl Default for HarmonicParams {
    fn default() -> Self {
        Self {
            fundamental: 220.0,
            ratios: MARTIGLI_RATIOS.to_vec(),
            gain: 0.3,
            pan: 0.0,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseParams {
    pub color: NoiseColor,
    pub gain: f32,
    pub pan: f32,
    /// Fixed seed for reproducible renders.
    pub seed: Option<u64>,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            color: NoiseColor::Pink,
            gain: 0.2,
            pan: 0.0,
            seed: None,
        }
    }
}

/// Parameters of a continuous track. The variant is the track kind.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub enum TrackParams {
    Tone(ToneParams),
    Beat(BeatParams),
    Isochronic(IsochronicParams),
    Harmonic(HarmonicParams),
    Noise(NoiseParams),
}

/// Kind of a live track, as reported in stats.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Tone,
    Binaural,
    Monaural,
    Isochronic,
    Harmonic,
    Noise,
    Ringing,
}

impl TrackKind {
    pub fn name(self) -> &'static str {
        match self {
            TrackKind::Tone => "tone",
            TrackKind::Binaural => "binaural",
            TrackKind::Monaural => "monaural",
            TrackKind::Isochronic => "isochronic",
            TrackKind::Harmonic => "harmonic",
            TrackKind::Noise => "noise",
            TrackKind::Ringing => "ringing",
        }
    }
}

/// Partial edit of a live track. `None` leaves a field unchanged.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackUpdate {
    pub frequency: Option<f32>,
    pub base: Option<f32>,
    pub beat: Option<f32>,
    pub left: Option<f32>,
    pub right: Option<f32>,
    pub gain: Option<f32>,
    /// Position of single-channel tracks; pan offset of beat tracks.
    pub pan: Option<f32>,
    pub pulse_rate: Option<f32>,
    pub duty_cycle: Option<f32>,
    pub waveform: Option<OscillatorWaveform>,
    pub mix: Option<MixMode>,
    pub noise_color: Option<NoiseColor>,
    pub pan_automation: Option<PanConfig>,
    /// `Some(empty)` disables breathing modulation.
    pub modulation: Option<Vec<ModulationParam>>,
}

impl TrackUpdate {
    pub fn beat(beat: f32) -> Self {
        Self {
            beat: Some(beat),
            ..Self::default()
        }
    }

    pub fn gain(gain: f32) -> Self {
        Self {
            gain: Some(gain),
            ..Self::default()
        }
    }
}

/// One change to send to a live voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum VoiceEdit {
    Param(VoiceParam, f32),
    Change(VoiceChange),
}

/// What an update touched besides voice parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct UpdateOutcome {
    pub edits: Vec<VoiceEdit>,
    /// Pan automation must be recomputed (beat tracks only).
    pub pan_changed: bool,
}

impl TrackParams {
    pub fn tone(frequency: f32) -> Self {
        TrackParams::Tone(ToneParams {
            frequency,
            ..ToneParams::default()
        })
    }

    pub fn binaural(base: f32, beat: f32) -> Self {
        TrackParams::Beat(BeatParams {
            frequencies: BeatFrequencies::Carrier { base, beat },
            ..BeatParams::default()
        })
    }

    pub fn monaural(base: f32, beat: f32) -> Self {
        TrackParams::Beat(BeatParams {
            frequencies: BeatFrequencies::Carrier { base, beat },
            mix: MixMode::Monaural,
            ..BeatParams::default()
        })
    }

    pub fn isochronic(frequency: f32, pulse_rate: f32) -> Self {
        TrackParams::Isochronic(IsochronicParams {
            frequency,
            pulse_rate,
            ..IsochronicParams::default()
        })
    }

    pub fn harmonic(fundamental: f32) -> Self {
        TrackParams::Harmonic(HarmonicParams {
            fundamental,
            ..HarmonicParams::default()
        })
    }

    pub fn noise(color: NoiseColor) -> Self {
        TrackParams::Noise(NoiseParams {
            color,
            ..NoiseParams::default()
        })
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        match &mut self {
            TrackParams::Tone(p) => p.gain = gain,
            TrackParams::Beat(p) => p.gain = gain,
            TrackParams::Isochronic(p) => p.gain = gain,
            TrackParams::Harmonic(p) => p.gain = gain,
            TrackParams::Noise(p) => p.gain = gain,
        }
        self
    }

    /// Pan automation of a beat pair. Other tracks ignore it.
    pub fn with_pan(mut self, pan: PanConfig) -> Self {
        if let TrackParams::Beat(p) = &mut self {
            p.pan = pan;
        }
        self
    }

    pub fn kind(&self) -> TrackKind {
        match self {
            TrackParams::Tone(_) => TrackKind::Tone,
            TrackParams::Beat(p) if p.mix == MixMode::Monaural => TrackKind::Monaural,
            TrackParams::Beat(_) => TrackKind::Binaural,
            TrackParams::Isochronic(_) => TrackKind::Isochronic,
            TrackParams::Harmonic(_) => TrackKind::Harmonic,
            TrackParams::Noise(_) => TrackKind::Noise,
        }
    }

    /// Clamp every numeric field to its documented range.
    pub fn sanitized(mut self) -> Self {
        match &mut self {
            TrackParams::Tone(p) => {
                p.frequency = clamp_frequency(p.frequency, AUDIBLE_RANGE);
                p.gain = clamp_gain(p.gain);
                p.pan = clamp_pan(p.pan);
            }
            TrackParams::Beat(p) => {
                let resolved = p.frequencies.resolve();
                p.frequencies = match p.frequencies {
                    BeatFrequencies::Carrier { .. } => BeatFrequencies::Carrier {
                        base: resolved.base,
                        beat: resolved.beat,
                    },
                    BeatFrequencies::Absolute { .. } => BeatFrequencies::Absolute {
                        left: resolved.left,
                        right: resolved.right,
                    },
                };
                p.gain = clamp_gain(p.gain);
                p.pan = p.pan.sanitized();
            }
            TrackParams::Isochronic(p) => {
                p.frequency = clamp_frequency(p.frequency, CARRIER_RANGE);
                p.pulse_rate = clamp_rate(p.pulse_rate);
                p.duty_cycle = clamp_duty(p.duty_cycle);
                p.gain = clamp_gain(p.gain);
                p.pan = clamp_pan(p.pan);
            }
            TrackParams::Harmonic(p) => {
                p.fundamental = clamp_frequency(p.fundamental, CARRIER_RANGE);
                p.ratios.retain(|r| r.is_finite() && *r > 0.0);
                if p.ratios.is_empty() {
                    p.ratios = MARTIGLI_RATIOS.to_vec();
                }
                p.gain = clamp_gain(p.gain);
                p.pan = clamp_pan(p.pan);
            }
            TrackParams::Noise(p) => {
                p.gain = clamp_gain(p.gain);
                p.pan = clamp_pan(p.pan);
            }
        }
        self
    }

    /// Build the render-side voice. Beat pans start at `pans`, which the pan
    /// automation resolves before the voice is added.
    pub(crate) fn build_voice(&self, pans: (f32, f32)) -> TrackVoice {
        match self {
            TrackParams::Tone(p) => {
                TrackVoice::Tone(ToneVoice::new(p.waveform, p.frequency, p.gain, p.pan))
            }
            TrackParams::Beat(p) => {
                let resolved = p.resolved();
                TrackVoice::Beat(BeatVoice::new(resolved.left, resolved.right, p.mix, p.gain, pans))
            }
            TrackParams::Isochronic(p) => TrackVoice::Isochronic(IsochronicVoice::new(
                p.frequency,
                p.pulse_rate,
                p.duty_cycle,
                p.gain,
                p.pan,
            )),
            TrackParams::Harmonic(p) => {
                TrackVoice::Harmonic(HarmonicVoice::new(p.fundamental, &p.ratios, p.gain, p.pan))
            }
            TrackParams::Noise(p) => TrackVoice::Noise(match p.seed {
                Some(seed) => NoiseVoice::seeded(p.color, seed, p.gain, p.pan),
                None => NoiseVoice::new(p.color, p.gain, p.pan),
            }),
        }
    }

    /// Apply the fields of `update` that this kind understands.
    pub(crate) fn apply_update(&mut self, update: &TrackUpdate) -> UpdateOutcome {
        let mut outcome = UpdateOutcome::default();
        let edits = &mut outcome.edits;

        let gain = update.gain.map(clamp_gain);
        match self {
            TrackParams::Tone(p) => {
                if let Some(frequency) = update.frequency {
                    p.frequency = clamp_frequency(frequency, AUDIBLE_RANGE);
                    edits.push(VoiceEdit::Param(VoiceParam::Frequency, p.frequency));
                }
                if let Some(waveform) = update.waveform {
                    p.waveform = waveform;
                    edits.push(VoiceEdit::Change(VoiceChange::Waveform(waveform)));
                }
                if let Some(pan) = update.pan {
                    p.pan = clamp_pan(pan);
                    edits.push(VoiceEdit::Param(VoiceParam::Pan, p.pan));
                }
                if let Some(gain) = gain {
                    p.gain = gain;
                }
            }
            TrackParams::Beat(p) => {
                let current = p.resolved();
                let absolute = update.left.is_some() || update.right.is_some();
                let carrier =
                    update.base.is_some() || update.beat.is_some() || update.frequency.is_some();
                if absolute {
                    let resolved = resolve_absolute(
                        update.left.unwrap_or(current.left),
                        update.right.unwrap_or(current.right),
                    );
                    p.frequencies = BeatFrequencies::Absolute {
                        left: resolved.left,
                        right: resolved.right,
                    };
                } else if carrier {
                    let resolved = resolve_carrier(
                        update.base.or(update.frequency).unwrap_or(current.base),
                        update.beat.unwrap_or(current.beat),
                    );
                    p.frequencies = BeatFrequencies::Carrier {
                        base: resolved.base,
                        beat: resolved.beat,
                    };
                }
                if absolute || carrier {
                    let resolved = p.resolved();
                    edits.push(VoiceEdit::Param(VoiceParam::LeftFrequency, resolved.left));
                    edits.push(VoiceEdit::Param(VoiceParam::RightFrequency, resolved.right));
                }
                if let Some(mix) = update.mix {
                    p.mix = mix;
                    edits.push(VoiceEdit::Change(VoiceChange::MixMode(mix)));
                    outcome.pan_changed = true;
                }
                if let Some(config) = update.pan_automation {
                    p.pan = config.sanitized();
                    outcome.pan_changed = true;
                }
                if let Some(offset) = update.pan {
                    p.pan.offset = clamp_pan(offset);
                    outcome.pan_changed = true;
                }
                if let Some(gain) = gain {
                    p.gain = gain;
                }
            }
            TrackParams::Isochronic(p) => {
                if let Some(frequency) = update.frequency {
                    p.frequency = clamp_frequency(frequency, CARRIER_RANGE);
                    edits.push(VoiceEdit::Param(VoiceParam::Frequency, p.frequency));
                }
                if let Some(rate) = update.pulse_rate {
                    p.pulse_rate = clamp_rate(rate);
                    edits.push(VoiceEdit::Param(VoiceParam::PulseRate, p.pulse_rate));
                }
                if let Some(duty) = update.duty_cycle {
                    p.duty_cycle = clamp_duty(duty);
                    edits.push(VoiceEdit::Param(VoiceParam::DutyCycle, p.duty_cycle));
                }
                if let Some(pan) = update.pan {
                    p.pan = clamp_pan(pan);
                    edits.push(VoiceEdit::Param(VoiceParam::Pan, p.pan));
                }
                if let Some(gain) = gain {
                    p.gain = gain;
                }
            }
            TrackParams::Harmonic(p) => {
                if let Some(frequency) = update.frequency.or(update.base) {
                    p.fundamental = clamp_frequency(frequency, CARRIER_RANGE);
                    edits.push(VoiceEdit::Param(VoiceParam::Frequency, p.fundamental));
                }
                if let Some(pan) = update.pan {
                    p.pan = clamp_pan(pan);
                    edits.push(VoiceEdit::Param(VoiceParam::Pan, p.pan));
                }
                if let Some(gain) = gain {
                    p.gain = gain;
                }
            }
            TrackParams::Noise(p) => {
                if let Some(color) = update.noise_color {
                    p.color = color;
                    edits.push(VoiceEdit::Change(VoiceChange::NoiseColor(color)));
                }
                if let Some(pan) = update.pan {
                    p.pan = clamp_pan(pan);
                    edits.push(VoiceEdit::Param(VoiceParam::Pan, p.pan));
                }
                if let Some(gain) = gain {
                    p.gain = gain;
                }
            }
        }
        if let Some(gain) = gain {
            edits.push(VoiceEdit::Param(VoiceParam::Gain, gain));
        }
        outcome
    }

    /// Human-readable summary for track lists.
    pub fn describe(&self) -> String {
        match self {
            TrackParams::Tone(p) => format!("{} {:.1} Hz", p.waveform.name(), p.frequency),
            TrackParams::Beat(p) => {
                let r = p.resolved();
                format!(
                    "{} {:.1} Hz, beat {:.1} Hz ({:.1} / {:.1} Hz)",
                    self.kind().name(),
                    r.base,
                    r.beat,
                    r.left,
                    r.right
                )
            }
            TrackParams::Isochronic(p) => format!(
                "isochronic {:.1} Hz pulsed at {:.1} Hz",
                p.frequency, p.pulse_rate
            ),
            TrackParams::Harmonic(p) => format!(
                "harmonic stack on {:.1} Hz ({} partials)",
                p.fundamental,
                p.ratios.len()
            ),
            TrackParams::Noise(p) => format!("{} noise", p.color.name()),
        }
    }
}

/// Arguments to `Engine::start`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSpec {
    pub params: TrackParams,
    /// Total length in seconds including the fade-out. `None` plays until stopped.
    #[cfg_attr(feature = "serde", serde(default))]
    pub duration: Option<f32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub modulation: Vec<ModulationParam>,
}

impl TrackSpec {
    pub fn new(params: TrackParams) -> Self {
        Self {
            params,
            duration: None,
            modulation: Vec::new(),
        }
    }

    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_modulation(mut self, params: Vec<ModulationParam>) -> Self {
        self.modulation = params;
        self
    }
}
