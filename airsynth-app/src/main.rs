//! # Air Synth - Hand Tracking Player
//!
//! Plays the air synth from a stream of hand-landmark frames written as JSON
//! lines by an external hand tracker (on stdin or from a recorded file).
//!
//! ## Architecture
//! - **Reader Thread**: parses input lines and forwards them over a channel
//! - **Main Thread**: owns the engine, processes frames in arrival order
//! - **Audio**: CPAL output stream, or an offline renderer with `--no-audio`
//! - **Status**: tracking accuracy logged once per second

mod input;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::Receiver;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use airsynth_core::audio::{OfflineRenderer, OutputDevice};
use airsynth_core::tuning::note_name;
use airsynth_core::{
    Engine, EngineConfig, EngineEvent, HandSide, PresetLibrary, DEFAULT_INSTRUMENT_ID,
};
use input::{ControlCommand, InputLine};

/// Sample rate used when no output device is opened.
const OFFLINE_SAMPLE_RATE: u32 = 48_000;

#[derive(Parser, Debug)]
#[command(name = "airsynth", about = "Play a synthesizer with your fingers")]
struct Cli {
    /// JSON-lines landmark stream ("-" for stdin)
    #[arg(short, long, default_value = "-")]
    frames: String,

    /// JSON preset file (defaults to the built-in library)
    #[arg(short, long)]
    presets: Option<PathBuf>,

    /// Instrument to start with
    #[arg(short, long, default_value = DEFAULT_INSTRUMENT_ID)]
    instrument: String,

    /// Volume in percent
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: Option<u8>,

    /// Engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render without an audio device
    #[arg(long)]
    no_audio: bool,

    /// List available instruments and exit
    #[arg(long)]
    list_instruments: bool,
}

/// Keeps whichever audio backend is running alive for the session.
enum AudioBackend {
    Device(cpal::Stream),
    Offline(OfflineRenderer),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("airsynth=info,airsynth_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let presets = match &cli.presets {
        Some(path) => PresetLibrary::load(path)?,
        None => PresetLibrary::builtin(),
    };

    if cli.list_instruments {
        for preset in presets.iter() {
            println!("{:<24} {:<28} {:?}", preset.id, preset.name, preset.category);
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(volume) = cli.volume {
        config.volume_percent = volume;
    }

    info!("Starting air synth with '{}'", cli.instrument);
    let mut engine = Engine::new(config, Box::new(presets), &cli.instrument)
        .context("creating engine")?;

    let audio = start_audio(&mut engine, cli.no_audio);

    let lines = spawn_reader(cli.frames.clone())?;
    run(&mut engine, lines);

    info!("Input finished, shutting down");
    engine.shutdown();
    match audio {
        AudioBackend::Device(stream) => drop(stream),
        AudioBackend::Offline(renderer) => renderer.stop(),
    }
    info!("Air synth finished");
    Ok(())
}

/// Opens the default output device, falling back to the offline renderer if
/// that fails or audio is disabled.
fn start_audio(engine: &mut Engine, no_audio: bool) -> AudioBackend {
    if !no_audio {
        match OutputDevice::open_default() {
            Ok(device) => {
                let graph = engine.initialize_audio(device.sample_rate());
                match device.start(graph) {
                    Ok(stream) => return AudioBackend::Device(stream),
                    Err(e) => {
                        error!("Failed to start audio stream: {:#}", e);
                        engine.synth_mut().dispose();
                    }
                }
            }
            Err(e) => error!("No audio output: {:#}", e),
        }
        warn!("Continuing without sound");
    }
    let graph = engine.initialize_audio(OFFLINE_SAMPLE_RATE);
    AudioBackend::Offline(OfflineRenderer::start(graph))
}

/// Spawns the reader thread. The channel closes when input ends.
fn spawn_reader(source: String) -> Result<Receiver<InputLine>> {
    let (tx, rx) = crossbeam_channel::bounded(64);
    let reader = input::open(&source)?;
    thread::Builder::new()
        .name("frame-reader".into())
        .spawn(move || {
            debug!("Reading frames from {}", source);
            let count = input::forward_lines(reader, &tx);
            debug!("Reader finished after {} lines", count);
        })
        .context("spawning reader thread")?;
    Ok(rx)
}

fn run(engine: &mut Engine, lines: Receiver<InputLine>) {
    let started = Instant::now();
    let status = crossbeam_channel::tick(Duration::from_secs(1));

    loop {
        crossbeam_channel::select! {
            recv(lines) -> msg => match msg {
                Ok(InputLine::Frame(frame)) => {
                    let timestamp = frame
                        .timestamp_ms
                        .unwrap_or_else(|| started.elapsed().as_secs_f64() * 1000.0);
                    let report = engine.process_frame(&frame.hands, timestamp);
                    for event in &report.events {
                        log_event(event);
                    }
                }
                Ok(InputLine::Command(command)) => apply_command(engine, command),
                Err(_) => break,
            },
            recv(status) -> _ => {
                info!(
                    "Tracking accuracy: left {:.0}%, right {:.0}% | sounding: {}",
                    engine.accuracy(HandSide::Left) * 100.0,
                    engine.accuracy(HandSide::Right) * 100.0,
                    engine.sounding_keys().len()
                );
            },
        }
    }
}

fn apply_command(engine: &mut Engine, command: ControlCommand) {
    match command {
        ControlCommand::SetInstrument { id } => {
            if let Err(e) = engine.set_instrument(&id) {
                warn!("{}", e);
            }
        }
        ControlCommand::SetVolume { percent } => {
            engine.set_volume_percent(percent);
            info!("Volume {}%", percent.min(100));
        }
        ControlCommand::Idle => engine.go_idle(),
        ControlCommand::ClearHistory => engine.clear_history(),
    }
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::NoteOn { key, notes } => {
            let names: Vec<&str> = notes.iter().filter_map(|n| note_name(*n)).collect();
            info!("♪ {} on [{}]", key, names.join(" "));
        }
        EngineEvent::NoteOff { key } => debug!("{} off", key),
        EngineEvent::Particle(p) => debug!(
            "particle '{}' {} at ({:.2}, {:.2})",
            p.display_name, p.color, p.position.x, p.position.y
        ),
        EngineEvent::History(h) => debug!("history #{} {}", h.id, h.display_name),
    }
}
