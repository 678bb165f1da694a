use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use biosyn_dsp::engine::params::TrackParams;
use biosyn_dsp::engine::{Engine, TrackSpec, TrackUpdate};
use biosyn_dsp::{EngineConfig, Renderer};

const SAMPLE_RATE: usize = 48_000;

fn setup() -> (Engine, Renderer) {
    let mut engine = Engine::new(EngineConfig::default());
    let renderer = engine.init(SAMPLE_RATE as f32).unwrap();
    (engine, renderer)
}

fn settle(engine: &mut Engine, renderer: &mut Renderer, seconds: f32) {
    let mut left = vec![0.0; 480];
    let mut right = vec![0.0; 480];
    for _ in 0..(seconds * 100.0) as usize {
        renderer.process(&mut left, &mut right);
        engine.tick();
    }
}

/// One second of audio, so every FFT bin is exactly 1 Hz wide.
fn capture(renderer: &mut Renderer) -> (Vec<f32>, Vec<f32>) {
    let mut left = vec![0.0; SAMPLE_RATE];
    let mut right = vec![0.0; SAMPLE_RATE];
    renderer.process(&mut left, &mut right);
    (left, right)
}

fn magnitudes(signal: &[f32]) -> Vec<f32> {
    let mut buffer: Vec<Complex<f32>> = signal.iter().map(|s| Complex::new(*s, 0.0)).collect();
    FftPlanner::new()
        .plan_fft_forward(buffer.len())
        .process(&mut buffer);
    buffer[..buffer.len() / 2].iter().map(|c| c.norm()).collect()
}

fn peak_hz(spectrum: &[f32]) -> usize {
    spectrum
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(bin, _)| bin)
        .unwrap()
}

#[test]
fn binaural_puts_one_tone_in_each_ear() {
    let (mut engine, mut renderer) = setup();
    engine
        .start(TrackSpec::new(TrackParams::binaural(200.0, 10.0).with_gain(0.5)))
        .unwrap();
    settle(&mut engine, &mut renderer, 0.2);

    let (left, right) = capture(&mut renderer);
    let (left, right) = (magnitudes(&left), magnitudes(&right));
    assert_eq!(peak_hz(&left), 195);
    assert_eq!(peak_hz(&right), 205);
    // Hard panned: the other tone barely leaks across.
    assert!(left[205] < left[195] * 0.01);
    assert!(right[195] < right[205] * 0.01);
}

#[test]
fn beat_update_retunes_both_ears() {
    let (mut engine, mut renderer) = setup();
    let id = engine
        .start(TrackSpec::new(TrackParams::binaural(300.0, 8.0).with_gain(0.5)))
        .unwrap();
    settle(&mut engine, &mut renderer, 0.1);
    assert!(engine.update(id, TrackUpdate::beat(4.0)));
    settle(&mut engine, &mut renderer, 0.5);

    let (left, right) = capture(&mut renderer);
    assert_eq!(peak_hz(&magnitudes(&left)), 298);
    assert_eq!(peak_hz(&magnitudes(&right)), 302);
}

#[test]
fn monaural_mixes_both_tones_into_both_ears() {
    let (mut engine, mut renderer) = setup();
    engine
        .start(TrackSpec::new(TrackParams::monaural(200.0, 10.0).with_gain(0.5)))
        .unwrap();
    settle(&mut engine, &mut renderer, 0.2);

    let (left, right) = capture(&mut renderer);
    for spectrum in [magnitudes(&left), magnitudes(&right)] {
        let (low, high) = (spectrum[195], spectrum[205]);
        assert!(low > 100.0 && high > 100.0);
        assert!((low / high - 1.0).abs() < 0.05);
        assert!(spectrum[200] < low * 0.05);
    }
}

#[test]
fn isochronic_pulse_shows_sidebands() {
    let (mut engine, mut renderer) = setup();
    engine
        .start(TrackSpec::new(TrackParams::isochronic(180.0, 12.0).with_gain(0.5)))
        .unwrap();
    settle(&mut engine, &mut renderer, 0.2);

    let (left, _) = capture(&mut renderer);
    let spectrum = magnitudes(&left);
    assert_eq!(peak_hz(&spectrum), 180);
    let floor = spectrum[150];
    assert!(spectrum[168] > floor * 10.0);
    assert!(spectrum[192] > floor * 10.0);
}
