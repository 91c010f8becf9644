/*!
# Telegram Grabber Application

Receive-side tool for the OOK remote-control protocol: classifies level
transitions into timed conditions, assembles them into 32-bit command
frames and logs the decoded frames.

## Features

- Two-stage decode pipeline (bit-timing detector, telegram decoder)
  connected by bounded channels
- Edge trace replay for traces recorded with the rftransmit tool
- Synthetic signal mode simulating a remote with alternating state
- Session frame logs as JSON lines, live JSON output on stdout
- Command-line interface and TOML configuration

## Usage

### Replay a recorded trace
```bash
rfgrabber capture --replay trace.json --live
```

### Simulate a remote
```bash
rfgrabber capture --synthetic --output-dir ./telegrams
```

### Run from a configuration file
```bash
rfgrabber --cli --config rfgrabber.toml
```
*/

use std::path::PathBuf;
use clap::{Parser, Subcommand};
use tracing::info;

mod bit_detector;
mod capture;
mod config;
mod telegram_sync;

use shared::frame::parse_station_id;

use capture::{EdgeSource, ReplayEdgeSource, SyntheticEdgeSource, TelegramGrabber};
use config::{AppConfig, GrabberConfig, SyntheticConfig};

#[derive(Parser)]
#[command(name = "rfgrabber")]
#[command(about = "OOK remote-control receiver: edge capture and telegram decoding")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "rfgrabber.toml")]
    config: PathBuf,

    /// Run in command-line mode from the configuration file
    #[arg(long)]
    cli: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start telegram capture
    Capture {
        /// Replay an edge trace file instead of capturing
        #[arg(long, value_name = "FILE")]
        replay: Option<PathBuf>,

        /// Generate a synthetic remote-control signal
        #[arg(long)]
        synthetic: bool,

        /// Print decoded frames as JSON on stdout
        #[arg(long)]
        live: bool,

        /// Output directory for frame logs (omit to disable storage)
        #[arg(short, long)]
        output_dir: Option<String>,

        /// Accepted shortfall below pulse duration targets, microseconds
        #[arg(long, value_name = "MICROS")]
        tolerance_early: Option<u64>,

        /// Accepted excess above pulse duration targets, microseconds
        #[arg(long, value_name = "MICROS")]
        tolerance_late: Option<u64>,

        /// Station id of the synthetic remote
        #[arg(long, value_parser = parse_station_id, default_value = "0x200A55A")]
        station_id: u32,

        /// Milliseconds between synthetic telegram bursts
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },

    /// Generate configuration file
    Config {
        /// Output path for configuration file
        #[arg(short, long, default_value = "rfgrabber.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Log to stderr so stdout stays clean for live frame output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Capture {
            replay,
            synthetic,
            live,
            output_dir,
            tolerance_early,
            tolerance_late,
            station_id,
            interval_ms,
        }) => {
            let mut grabber_config = GrabberConfig {
                live_output: live,
                enable_storage: output_dir.is_some(),
                ..GrabberConfig::default()
            };
            if let Some(dir) = output_dir {
                grabber_config.output_directory = dir;
            }
            if let Some(early) = tolerance_early {
                grabber_config.tolerance_early_micros = early;
            }
            if let Some(late) = tolerance_late {
                grabber_config.tolerance_late_micros = late;
            }

            let synthetic_config = SyntheticConfig {
                station_id,
                interval_ms,
                ..SyntheticConfig::default()
            };

            run_capture(grabber_config, synthetic_config, replay, synthetic)
        }

        Some(Commands::Config { output }) => {
            // Generate configuration file
            generate_config_file(output)
        }

        None => {
            if cli.cli {
                // CLI mode with config file
                run_capture_from_config(cli.config)
            } else {
                Err("nothing to do: use the capture subcommand, or --cli with a config file".into())
            }
        }
    }
}

/// Run the capture pipeline with an edge source picked from the flags
fn run_capture(
    grabber_config: GrabberConfig,
    synthetic_config: SyntheticConfig,
    replay: Option<PathBuf>,
    synthetic: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if replay.is_some() && synthetic {
        return Err("--replay and --synthetic are mutually exclusive".into());
    }

    let mut grabber = TelegramGrabber::new(grabber_config);
    let running = grabber.get_running_flag();

    let source: Box<dyn EdgeSource> = match replay {
        Some(path) => {
            info!("🚀 Starting capture (replaying {})", path.display());
            Box::new(ReplayEdgeSource::from_file(&path)?)
        }
        None if synthetic => {
            info!("🚀 Starting capture (synthetic signal)");
            Box::new(SyntheticEdgeSource::new(
                synthetic_config,
                grabber.get_running_flag(),
            )?)
        }
        None => {
            return Err("choose an edge source: --replay <file> or --synthetic".into());
        }
    };

    // Set up Ctrl+C handler
    ctrlc::set_handler(move || {
        eprintln!("\n🛑 Received Ctrl+C, shutting down gracefully...");
        running.store(false, std::sync::atomic::Ordering::SeqCst);
    })?;

    let summary = grabber.start(source)?;
    info!("✅ Capture completed: {} frames", summary.frames_received);
    Ok(())
}

/// Run telegram capture from configuration file
fn run_capture_from_config(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_from_file(&config_path)?;

    info!("🚀 Starting capture from config: {}", config_path.display());
    run_capture(config.grabber, config.synthetic, None, true)
}

/// Generate a default configuration file
fn generate_config_file(output_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::new();
    config.save_to_file(&output_path)?;

    println!("✅ Generated configuration file: {}", output_path.display());
    println!("📝 Edit the file to customize settings, then run:");
    println!("   rfgrabber --cli --config {}", output_path.display());

    Ok(())
}
