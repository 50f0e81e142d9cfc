//! dcv-probe - inspect encoded dcv containers
//!
//! Walks a container structurally and prints the header, quantiser, and
//! per-frame payload breakdown without reconstructing any pixels.
//!
//! The container itself does not say whether it holds an image or a video
//! (that lives in the settings file), so video streams need `--video`.
//!
//! # Usage
//!
//! ```bash
//! # Inspect an encoded image
//! dcv-probe out.enc
//!
//! # Inspect an encoded video stream
//! dcv-probe --video out.enc
//! ```

use std::path::PathBuf;
use std::process;

use clap::Parser;

use dcv_lib::probe;

#[derive(Parser, Debug)]
#[command(name = "dcv-probe")]
#[command(about = "Inspect encoded dcv containers", long_about = None)]
#[command(version)]
struct Args {
    /// Encoded file to probe
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Treat the container as a video stream
    #[arg(long)]
    video: bool,
}

fn main() {
    let args = Args::parse();

    let data = match std::fs::read(&args.file) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("Error: failed to read '{}': {}", args.file.display(), err);
            process::exit(1);
        }
    };

    if args.video {
        match probe::probe_video(&data) {
            Ok(info) => print!("{}", info),
            Err(err) => {
                eprintln!("Error: failed to probe '{}': {}", args.file.display(), err);
                process::exit(1);
            }
        }
    } else {
        match probe::probe_image(&data) {
            Ok(info) => print!("{}", info),
            Err(err) => {
                eprintln!("Error: failed to probe '{}': {}", args.file.display(), err);
                process::exit(1);
            }
        }
    }
}
