// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Running the booth against the controller board
//! - Composing a strip from existing images
//! - Printing a file through the fallback chain
//! - Showing the effective configuration

use photobooth::backends::printer::{Printer, PrinterDispatch};
use photobooth::booth::{BoothController, CapturedPhoto};
use photobooth::config::BoothConfig;
use photobooth::pipelines::strip::StripPipeline;
use photobooth::storage::BoothDirs;
use photobooth::transport::SerialLink;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing::info;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// `--config`, else `~/.config/photobooth/config.toml` if present, else defaults
fn load_config(path: Option<PathBuf>) -> Result<BoothConfig, Box<dyn std::error::Error>> {
    let path = path.or_else(|| {
        dirs::config_dir()
            .map(|dir| dir.join("photobooth").join("config.toml"))
            .filter(|p| p.is_file())
    });

    match path {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            Ok(BoothConfig::from_file(&path)?)
        }
        None => Ok(BoothConfig::default()),
    }
}

/// Run the booth until Ctrl+C
pub fn run_booth(
    config: Option<PathBuf>,
    device: Option<String>,
    baud: Option<u32>,
    simulate_camera: bool,
) -> CliResult {
    let mut config = load_config(config)?;
    if let Some(device) = device {
        config.link.device = device;
    }
    if let Some(baud) = baud {
        config.link.baud_rate = baud;
    }
    if simulate_camera {
        config.camera.simulate = true;
    }
    config.validate()?;

    let mut booth = BoothController::from_config(&config)?;

    // Set up Ctrl+C handler
    let running = booth.running_flag();
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })?;

    booth.initialize(SerialLink::from_config(&config.link))?;
    booth.run()?;
    Ok(())
}

/// Process and compose `images` into one strip
pub fn make_strip(images: &[PathBuf], output: Option<PathBuf>, config: Option<PathBuf>) -> CliResult {
    let mut config = load_config(config)?;
    config.session.photo_count = images.len() as u32;
    config.camera.simulate = true;
    config.validate()?;

    let dirs = BoothDirs::new(&config.storage.resolved_base_dir());
    dirs.ensure()?;
    let pipeline = StripPipeline::from_config(&config, dirs);

    let photos: Vec<CapturedPhoto> = images
        .iter()
        .enumerate()
        .map(|(index, path)| CapturedPhoto {
            sequence_number: index as u32 + 1,
            storage_location: path.clone(),
            captured_at: chrono::Local::now(),
        })
        .collect();

    println!("Composing strip from {} images...", photos.len());
    let strip = pipeline.run(uuid::Uuid::new_v4(), &photos, config.session.photo_count)?;

    let final_path = match output {
        Some(output) => {
            std::fs::copy(&strip.storage_location, &output)?;
            output
        }
        None => strip.storage_location,
    };
    println!("Strip saved: {}", final_path.display());
    Ok(())
}

/// Print `file` through CUPS, falling back to lpr
pub fn print_file(file: &Path, config: Option<PathBuf>) -> CliResult {
    let config = load_config(config)?;
    let mut printer = PrinterDispatch::from_config(&config.printer);

    println!("Printing {}...", file.display());
    printer.print(file)?;
    println!("Print job queued.");
    Ok(())
}

/// Show the effective configuration
pub fn show_config(config: Option<PathBuf>) -> CliResult {
    let config = load_config(config)?;
    print!("{}", config.to_toml()?);
    Ok(())
}
