//! dcv CLI - encode and decode through a settings file
//!
//! Runs the full pipeline the settings file describes: the raw input is
//! encoded to the container format, then the container is decoded back so
//! the reconstruction can be inspected next to the original.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing::info;

use dcv_lib::config::{Mode, Settings};
use dcv_lib::scheduler::Scheduler;
use dcv_lib::{ImageDecoder, ImageEncoder, QuantMatrix, VideoDecoder, VideoEncoder};

// Exit codes are part of the external contract.
const EXIT_USAGE: u8 = 1;
const EXIT_SETTINGS_READ: u8 = 2;
const EXIT_SETTINGS_INVALID: u8 = 3;
const EXIT_MATRIX: u8 = 4;
const EXIT_CAST: u8 = 5;

#[derive(Parser)]
#[command(name = "dcv")]
#[command(about = "DCT image/video codec driven by a settings file", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the key=value settings file
    settings: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

/// Numeric settings shared by both pipelines, cast up front so a bad
/// value fails with its own exit code.
struct Params {
    width: usize,
    height: usize,
    use_rle: bool,
    video: Option<VideoParams>,
}

struct VideoParams {
    gop: usize,
    merange: usize,
    motion_comp: bool,
}

impl Params {
    fn from_settings(settings: &Settings, mode: Mode) -> dcv_lib::Result<Self> {
        let width = usize::from(settings.numeric::<u16>("width")?);
        let height = usize::from(settings.numeric::<u16>("height")?);
        let use_rle = settings.flag("rle")?;

        let video = match mode {
            Mode::Image => None,
            Mode::Video => Some(VideoParams {
                gop: usize::from(settings.numeric::<u16>("gop")?),
                merange: usize::from(settings.numeric::<u16>("merange")?),
                motion_comp: settings.flag("motioncompensation")?,
            }),
        };

        Ok(Params {
            width,
            height,
            use_rle,
            video,
        })
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let settings = match Settings::from_file(&cli.settings) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Error reading settings '{}': {}", cli.settings.display(), err);
            return ExitCode::from(EXIT_SETTINGS_READ);
        }
    };

    let mode = match settings.verify() {
        Ok(mode) => mode,
        Err(err) => {
            eprintln!("Error in settings: {}", err);
            return ExitCode::from(EXIT_SETTINGS_INVALID);
        }
    };

    if let Err(err) = init_logging(&settings, cli.verbose, cli.debug) {
        eprintln!("Error opening log file: {}", err);
        return ExitCode::from(EXIT_USAGE);
    }

    let quant_path = match settings.value("quantfile") {
        Ok(path) => path,
        Err(err) => {
            eprintln!("Error in settings: {}", err);
            return ExitCode::from(EXIT_SETTINGS_INVALID);
        }
    };
    let quant = match QuantMatrix::from_file(quant_path) {
        Ok(quant) => quant,
        Err(err) => {
            eprintln!("Error loading quantisation matrix '{}': {}", quant_path, err);
            return ExitCode::from(EXIT_MATRIX);
        }
    };

    let params = match Params::from_settings(&settings, mode) {
        Ok(params) => params,
        Err(err) => {
            eprintln!("Error in settings: {}", err);
            return ExitCode::from(EXIT_CAST);
        }
    };

    match run(&settings, params, quant) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

/// Route tracing output to the configured log file, or stderr when the
/// logfile value is empty.
fn init_logging(settings: &Settings, verbose: bool, debug: bool) -> anyhow::Result<()> {
    let level = if debug {
        "trace"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let logfile = settings.value("logfile").unwrap_or("");
    if logfile.is_empty() {
        tracing_subscriber::fmt()
            .with_env_filter(level)
            .with_writer(std::io::stderr)
            .init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(logfile)?;
        tracing_subscriber::fmt()
            .with_env_filter(level)
            .with_ansi(false)
            .with_writer(Arc::new(file))
            .init();
    }
    Ok(())
}

/// Encode rawfile to encfile, then decode encfile to decfile.
fn run(settings: &Settings, params: Params, quant: QuantMatrix) -> anyhow::Result<()> {
    let rawfile = settings.value("rawfile")?;
    let encfile = settings.value("encfile")?;
    let decfile = settings.value("decfile")?;

    info!(version = dcv_lib::VERSION, rawfile, encfile, decfile, "dcv starting");
    let started = Instant::now();

    let raw = std::fs::read(rawfile)?;

    match params.video {
        None => {
            let encoder = ImageEncoder::new(params.width, params.height, params.use_rle, quant)?
                .with_scheduler(Scheduler::WorkStealing);
            let encoded = encoder.encode(&raw)?;
            std::fs::write(encfile, &encoded)?;
            info!(bytes = encoded.len(), "wrote encoded image");

            let decoded = ImageDecoder::new().decode(&encoded)?;
            std::fs::write(decfile, &decoded.pixels)?;
            info!(bytes = decoded.pixels.len(), "wrote decoded image");
        }
        Some(video) => {
            let encoder = VideoEncoder::new(
                params.width,
                params.height,
                params.use_rle,
                video.gop,
                video.merange,
                video.motion_comp,
                quant,
            )?
            .with_scheduler(Scheduler::WorkStealing);
            let encoded = encoder.encode(&raw)?;
            std::fs::write(encfile, &encoded)?;
            info!(bytes = encoded.len(), "wrote encoded video");

            let decoded = VideoDecoder::new().decode(&encoded)?;
            std::fs::write(decfile, &decoded.data)?;
            info!(
                frames = decoded.frames,
                bytes = decoded.data.len(),
                "wrote decoded video"
            );
        }
    }

    info!(elapsed_ms = started.elapsed().as_millis() as u64, "dcv finished");
    Ok(())
}
