// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::MakeWriterExt;

mod cli;

#[derive(Parser)]
#[command(name = "photobooth")]
#[command(about = "Unattended photo booth controller")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    /// Also append log output to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the booth (default)
    Run {
        /// Configuration file (default: ~/.config/photobooth/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Serial device of the controller board
        #[arg(short, long)]
        device: Option<String>,

        /// Serial baud rate
        #[arg(short, long)]
        baud: Option<u32>,

        /// Use a generated test pattern instead of the camera
        #[arg(long)]
        simulate_camera: bool,
    },

    /// Compose a strip from existing images without printing
    Strip {
        /// Images in strip order (top to bottom)
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Copy the finished strip here
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Send a file through the printer fallback chain
    Print {
        file: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=photobooth=debug, RUST_LOG=info
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,photobooth=info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true);

    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            subscriber
                .with_ansi(false)
                .with_writer(std::io::stdout.and(Mutex::new(file)))
                .init();
        }
        None => subscriber.init(),
    }

    match cli.command {
        Some(Commands::Run {
            config,
            device,
            baud,
            simulate_camera,
        }) => cli::run_booth(config, device, baud, simulate_camera),
        Some(Commands::Strip {
            images,
            output,
            config,
        }) => cli::make_strip(&images, output, config),
        Some(Commands::Print { file, config }) => cli::print_file(&file, config),
        Some(Commands::Config { config }) => cli::show_config(config),
        None => cli::run_booth(None, None, None, false),
    }
}
