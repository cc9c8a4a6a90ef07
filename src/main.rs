//! Synesthetica command-line front end.
//!
//! Renders images to WAV, plays them through the default output device,
//! sonifies them live, or traces a stroke across them.

use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};

use synesthetica::audio::AudioContext;
use synesthetica::config::{default_settings_path, load_settings, EngineSettings};
use synesthetica::image_sonifier::read_image;
use synesthetica::instrument::{BrushKind, InstrumentId};
use synesthetica::mode::SonificationMode;
use synesthetica::trigger::{CanvasSize, StrokePointEvent, SystemClock};
use synesthetica::SonificationEngine;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "synesthetica")]
#[command(version, about = "Turn colors into sound", long_about = None)]
struct Cli {
    /// Settings file (default: ~/.synesthetica/settings.yaml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct SoundArgs {
    /// Sonification mode: simple, timeline, colorfield, harmonic
    #[arg(short, long)]
    mode: Option<String>,

    /// Instrument name (see `instruments`)
    #[arg(short, long)]
    instrument: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an image offline and write a WAV file
    Render {
        image: PathBuf,

        #[command(flatten)]
        sound: SoundArgs,

        /// Duration in seconds, clamped to the mode's range
        #[arg(short, long)]
        duration: Option<f64>,

        /// Sample rate in Hz
        #[arg(short = 'r', long)]
        sample_rate: Option<u32>,

        /// Output path (default: generated file name in the current directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Render an image and play it through the default output device
    Play {
        image: PathBuf,

        #[command(flatten)]
        sound: SoundArgs,

        #[arg(short, long)]
        duration: Option<f64>,

        #[arg(short = 'r', long)]
        sample_rate: Option<u32>,
    },

    /// Play an image live, voice by voice
    Sonify {
        image: PathBuf,

        #[command(flatten)]
        sound: SoundArgs,

        /// Cells per side in colorfield mode
        #[arg(long, default_value = "4")]
        grid: u32,
    },

    /// Drag a diagonal stroke across an image and play it as it goes
    Trace {
        image: PathBuf,

        #[command(flatten)]
        sound: SoundArgs,

        /// Brush name
        #[arg(short, long, default_value = "round")]
        brush: String,

        /// Milliseconds between stroke points
        #[arg(long, default_value = "20")]
        step_ms: u64,
    },

    /// List the instrument catalog
    Instruments,
}

fn main() {
    synesthetica::init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let settings_path = cli.settings.unwrap_or_else(default_settings_path);
    let settings = load_settings(&settings_path)?;

    match cli.command {
        Commands::Render {
            image,
            sound,
            duration,
            sample_rate,
            out,
        } => {
            let settings = apply_overrides(settings, &sound, duration, sample_rate);
            render_to_file(&image, settings, out.as_deref())
        }
        Commands::Play {
            image,
            sound,
            duration,
            sample_rate,
        } => {
            let settings = apply_overrides(settings, &sound, duration, sample_rate);
            play(&image, settings)
        }
        Commands::Sonify { image, sound, grid } => {
            let settings = apply_overrides(settings, &sound, None, None);
            sonify(&image, settings, grid)
        }
        Commands::Trace {
            image,
            sound,
            brush,
            step_ms,
        } => {
            let settings = apply_overrides(settings, &sound, None, None);
            trace(&image, settings, BrushKind::from_name(&brush), step_ms)
        }
        Commands::Instruments => {
            list_instruments();
            Ok(())
        }
    }
}

fn apply_overrides(
    mut settings: EngineSettings,
    sound: &SoundArgs,
    duration: Option<f64>,
    sample_rate: Option<u32>,
) -> EngineSettings {
    if let Some(mode) = &sound.mode {
        settings.mode = SonificationMode::from_name(mode);
    }
    if let Some(instrument) = &sound.instrument {
        settings.instrument = InstrumentId::from_name(instrument);
    }
    if let Some(seconds) = duration {
        settings.durations.set(settings.mode, seconds);
    }
    if let Some(rate) = sample_rate {
        settings.sample_rate = rate;
    }
    settings.validated()
}

/// Ctrl-C flips the returned flag to `false`.
fn install_stop_handler() -> Result<Arc<AtomicBool>, Box<dyn Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))?;
    Ok(running)
}

fn render_to_file(
    image: &Path,
    settings: EngineSettings,
    out: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let pixels = read_image(image)?;
    let mut engine =
        SonificationEngine::with_clock(Rc::new(AudioContext::silent()), settings, SystemClock::new());
    engine
        .render_snapshot(&pixels)
        .ok_or("render produced no audio")?;
    let download = engine.download().ok_or("render produced no audio")?;

    let path = out.map_or_else(|| PathBuf::from(&download.file_name), Path::to_path_buf);
    std::fs::write(&path, &download.bytes)?;
    println!("wrote {} ({} bytes)", path.display(), download.bytes.len());
    Ok(())
}

fn play(image: &Path, settings: EngineSettings) -> Result<(), Box<dyn Error>> {
    let pixels = read_image(image)?;
    let running = install_stop_handler()?;
    let mut engine = SonificationEngine::with_default_device(settings);

    engine
        .play(&pixels)
        .ok_or("nothing to play: no audio output device")?;
    println!(
        "playing {} ({} mode, {}), Ctrl-C to stop",
        image.display(),
        engine.settings().mode,
        engine.settings().instrument
    );

    while running.load(Ordering::SeqCst) {
        let status = engine.tick();
        print!("\r{:7.1}s / {:.1}s", status.current_time, status.duration);
        std::io::stdout().flush()?;
        if !status.is_playing {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }
    println!();
    engine.close();
    Ok(())
}

fn sonify(image: &Path, settings: EngineSettings, grid: u32) -> Result<(), Box<dyn Error>> {
    let running = install_stop_handler()?;
    let mut engine = SonificationEngine::with_default_device(settings);
    engine.open_image(image)?;
    engine.image_sonifier().set_grid(grid);

    let voices = engine.play_image();
    if voices == 0 {
        return Err("nothing to play: no audio output device".into());
    }
    println!("sonifying {} with {voices} voices, Ctrl-C to stop", image.display());

    while running.load(Ordering::SeqCst) {
        engine.tick();
        if !engine.image_sonifier().is_playing() {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }
    engine.close();
    Ok(())
}

fn trace(
    image: &Path,
    settings: EngineSettings,
    brush: BrushKind,
    step_ms: u64,
) -> Result<(), Box<dyn Error>> {
    let pixels = read_image(image)?;
    let running = install_stop_handler()?;
    let mut engine = SonificationEngine::with_default_device(settings);

    let (width, height) = (pixels.width(), pixels.height());
    engine.set_canvas(CanvasSize::new(width as f64, height as f64));

    let steps = width.max(height);
    let mut played = 0usize;
    for i in 0..steps {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let x = (i as u64 * width as u64 / steps as u64) as u32;
        let y = (i as u64 * height as u64 / steps as u64) as u32;
        let Some(color) = pixels.pixel(x, y) else {
            continue;
        };
        let event = StrokePointEvent {
            x: x as f64,
            y: y as f64,
            color,
            brush,
            timestamp_ms: i as u64 * step_ms,
        };
        if engine.on_stroke_point(&event).is_some() {
            played += 1;
        }
        engine.tick();
        thread::sleep(Duration::from_millis(step_ms));
    }
    println!("{played} of {steps} stroke points sounded");

    // let the last release tails ring out
    thread::sleep(Duration::from_secs(1));
    engine.close();
    Ok(())
}

fn list_instruments() {
    println!(
        "{:<10} {:<10} {:>9} {:>9}  {:<24} quantized",
        "name", "waveform", "min Hz", "max Hz", "mapping"
    );
    for id in InstrumentId::ALL {
        let p = id.profile();
        println!(
            "{:<10} {:<10} {:>9.2} {:>9.2}  {:<24} {}",
            p.name,
            format!("{:?}", p.waveform),
            p.fundamental_range.min,
            p.fundamental_range.max,
            format!("{:?}", p.mapping),
            p.quantize
        );
    }
}
