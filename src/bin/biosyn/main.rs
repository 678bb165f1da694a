//! biosyn - play or render breathing-paced tone presets and peals
//!
//! Run with: cargo run -- play binaural --seconds 30

mod presets;

use std::path::{Path, PathBuf};
use std::time::Duration;

use biosyn_dsp::dsp::lfo::Vibrato;
use biosyn_dsp::engine::peal::{Peal, PealTiming};
use biosyn_dsp::engine::ringing::{ringing_length, RenderOptions, RingingSchedule};
use biosyn_dsp::engine::{Engine, EngineEvent, TrackSpec};
use biosyn_dsp::io::{render_offline, OutputStream};
use biosyn_dsp::EngineConfig;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use presets::Preset;

#[derive(Parser)]
#[command(name = "biosyn")]
#[command(about = "Breathing-paced tone engine", long_about = None)]
struct Cli {
    /// Engine configuration (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a preset on the default output device
    Play {
        #[arg(value_enum)]
        preset: Preset,

        #[arg(short, long, default_value = "30.0")]
        seconds: f32,

        /// Swell the gain with the breathing signal
        #[arg(short, long)]
        breathing: bool,
    },
    /// Render a preset to a WAV file
    Render {
        #[arg(value_enum)]
        preset: Preset,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long, default_value = "10.0")]
        seconds: f32,

        #[arg(short, long)]
        breathing: bool,
    },
    /// Render a peal file (one row per line) or a JSON schedule to a WAV file
    Peal(PealArgs),
}

#[derive(clap::Args)]
struct PealArgs {
    input: PathBuf,

    #[arg(short, long)]
    output: PathBuf,

    /// Pitch of the treble in Hz
    #[arg(long, default_value = "220.0")]
    base: f32,

    /// Seconds between strikes
    #[arg(long, default_value = "0.3")]
    interval: f64,

    /// Vibrato rate in Hz (0 for none)
    #[arg(long, default_value = "0.0")]
    vibrato_hz: f32,

    /// Vibrato depth, 0 to 1 (1 is a semitone)
    #[arg(long, default_value = "0.0")]
    vibrato_depth: f32,

    /// Also write the peal's summary: JSON for a .json path, text otherwise
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_toml_file(path)
            .wrap_err_with(|| format!("failed to load {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Play {
            preset,
            seconds,
            breathing,
        } => play(config, preset, seconds, breathing),
        Commands::Render {
            preset,
            output,
            seconds,
            breathing,
        } => render(config, preset, &output, seconds, breathing),
        Commands::Peal(args) => peal(config, &args),
    }
}

fn spec(preset: Preset, seconds: f32, breathing: bool) -> TrackSpec {
    let spec = TrackSpec::new(preset.params()).with_duration(seconds);
    if breathing {
        spec.with_modulation(Preset::breathing_gain())
    } else {
        spec
    }
}

fn report(events: &[EngineEvent]) {
    for event in events {
        match event {
            EngineEvent::Safety(safety) => warn!(?safety, "safety event"),
            other => info!(?other, "engine event"),
        }
    }
}

fn play(config: EngineConfig, preset: Preset, seconds: f32, breathing: bool) -> EyreResult<()> {
    let mut engine = Engine::new(config);
    let stream = OutputStream::open_default(&mut engine).wrap_err("failed to open audio output")?;
    info!(device = stream.device_name(), "playing {:?} for {seconds} s", preset);

    let id = engine.start(spec(preset, seconds, breathing))?;
    for summary in engine.stats().tracks {
        info!(id = %summary.id, kind = summary.kind.name(), "{}", summary.description);
    }

    // The engine is driven from here; the device callback only renders.
    while engine.contains(id) {
        std::thread::sleep(Duration::from_millis(10));
        report(&engine.tick());
    }
    // Let the release reach the device before the stream is dropped.
    std::thread::sleep(Duration::from_millis(200));
    Ok(())
}

fn render(
    config: EngineConfig,
    preset: Preset,
    output: &Path,
    seconds: f32,
    breathing: bool,
) -> EyreResult<()> {
    let sample_rate = config.sample_rate as f32;
    let block_size = config.block_size;
    let mut engine = Engine::new(config);
    let mut renderer = engine.init(sample_rate)?;

    engine.start(spec(preset, seconds, breathing))?;
    let rendered = render_offline(&mut engine, &mut renderer, seconds as f64, block_size, false);
    report(&rendered.events);
    rendered.write_wav(output)?;
    info!(path = %output.display(), seconds = rendered.duration(), "rendered {:?}", preset);
    Ok(())
}

/// A `.json` input is a ready-made schedule; anything else is a peal file,
/// returned alongside so it can be summarised.
fn load_schedule(args: &PealArgs) -> EyreResult<(RingingSchedule, Option<Peal>)> {
    let input = &args.input;
    if input.extension().is_some_and(|ext| ext == "json") {
        let source = std::fs::read_to_string(input)
            .wrap_err_with(|| format!("failed to read {}", input.display()))?;
        let schedule = RingingSchedule::from_json_str(&source)?;
        info!(events = schedule.events.len(), stage = schedule.effective_stage(), "schedule loaded");
        return Ok((schedule, None));
    }
    let peal = Peal::from_file(input).wrap_err_with(|| format!("failed to read {}", input.display()))?;
    let timing = PealTiming {
        base_frequency: args.base,
        strike_interval: args.interval,
        ..PealTiming::default()
    };
    info!(title = %peal.title, stage = peal.stage, rows = peal.rows.len(), "peal loaded");
    Ok((peal.to_schedule(&timing), Some(peal)))
}

fn write_summary(peal: &Peal, path: &Path) -> EyreResult<()> {
    let text = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::to_string_pretty(&peal.summary())?
    } else {
        peal.to_plain_text()
    };
    std::fs::write(path, text).wrap_err_with(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "peal summary written");
    Ok(())
}

fn peal(config: EngineConfig, args: &PealArgs) -> EyreResult<()> {
    let (schedule, peal) = load_schedule(args)?;
    if let Some(path) = &args.summary {
        match &peal {
            Some(peal) => write_summary(peal, path)?,
            None => warn!("JSON schedules carry no peal summary, skipping"),
        }
    }

    let options = RenderOptions {
        vibrato: Vibrato::new(args.vibrato_hz, args.vibrato_depth),
        ..RenderOptions::default()
    };
    let sample_rate = config.sample_rate as f32;
    let block_size = config.block_size;
    let teardown = config.ringing_teardown_secs as f64;
    let mut engine = Engine::new(config);
    let mut renderer = engine.init(sample_rate)?;

    engine
        .render_ringing(&schedule, &options)?
        .ok_or_else(|| eyre!("peal has no audible strikes"))?;

    let limit = ringing_length(&schedule, &options) + teardown + 1.0;
    let rendered = render_offline(&mut engine, &mut renderer, limit, block_size, true);
    report(&rendered.events);
    rendered.write_wav(&args.output)?;
    info!(path = %args.output.display(), seconds = rendered.duration(), "peal rendered");
    Ok(())
}
