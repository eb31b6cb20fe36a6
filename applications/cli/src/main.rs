/// CamS3 host harness - drives the capture pipeline against a host directory
use anyhow::Context;
use cams3_capture::config::CaptureConfig;
use cams3_capture::sim::{Signal, SimCamera, SimPdm};
use cams3_capture::{CaptureOrchestrator, HostVolume, MonotonicClock};
use cams3_core::DirEntry;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Rig = CaptureOrchestrator<SimCamera, SimPdm, HostVolume, MonotonicClock>;

#[derive(Parser)]
#[command(name = "cams3-cli")]
#[command(about = "Capture images and audio with the CamS3 pipeline on a host machine", long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory standing in for the SD card
    #[arg(short, long, global = true, default_value = "cams3-volume")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture one frame to the volume
    Snap {
        /// Target path on the volume (generated when omitted)
        #[arg(short, long)]
        path: Option<String>,
        /// Simulated sensor model
        #[arg(short, long, value_enum, default_value_t = Sensor::Ov5640)]
        sensor: Sensor,
    },
    /// Record a test tone to a WAV file
    Record {
        /// Target path on the volume (generated when omitted)
        #[arg(short, long)]
        path: Option<String>,
        /// Recording length in milliseconds
        #[arg(short, long)]
        duration_ms: u32,
        /// Tone frequency in Hz
        #[arg(long, default_value_t = 440)]
        tone_hz: u32,
    },
    /// Print peak and RMS level of one microphone read
    Level {
        /// Samples per reading (defaults to the configured window)
        #[arg(short, long)]
        window: Option<usize>,
    },
    /// List the volume
    Ls {
        /// Directory to list
        #[arg(default_value = "/")]
        path: String,
        /// How many directory levels to descend
        #[arg(short, long, default_value_t = 1)]
        levels: u8,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Sensor {
    Ov5640,
    Ov3660,
    Ov2640,
}

impl Sensor {
    fn camera(self) -> SimCamera {
        match self {
            Sensor::Ov5640 => SimCamera::ov5640(),
            Sensor::Ov3660 => SimCamera::ov3660(),
            Sensor::Ov2640 => SimCamera::ov2640(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cams3_capture=info,cams3_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = CaptureConfig::load(cli.config.as_deref()).context("loading configuration")?;
    tracing::debug!(root = %cli.root.display(), "using host volume");

    match cli.command {
        Commands::Snap { path, sensor } => {
            let mut rig = rig(&cli.root, sensor.camera(), Signal::Silence, config);
            rig.initialize_all(true, false)?;
            let written = rig.capture_image_to_store(path.as_deref())?;
            println!(
                "{} ({}) -> {}",
                rig.camera().sensor_name(),
                rig.store().card_type_name(),
                written
            );
            rig.teardown_all()?;
        }
        Commands::Record {
            path,
            duration_ms,
            tone_hz,
        } => {
            let period = config.microphone.sample_rate_hz / tone_hz.max(1);
            let signal = Signal::Tone {
                amplitude: 8000,
                period,
            };
            let mut rig = rig(&cli.root, SimCamera::ov5640(), signal, config);
            rig.initialize_all(true, true)?;
            let written = rig.record_audio_to_store(path.as_deref(), duration_ms)?;
            println!("{duration_ms} ms -> {written}");
            rig.teardown_all()?;
        }
        Commands::Level { window } => {
            let window = window.unwrap_or(config.recording.level_window);
            let mut rig = rig(&cli.root, SimCamera::ov5640(), Signal::Alternating(1000), config);
            rig.initialize_all(false, true)?;
            let peak = rig.mic_mut().peak_amplitude(window);
            let rms = rig.mic_mut().rms_level(window);
            println!("peak {peak}  rms {rms}  ({window} samples)");
            rig.teardown_all()?;
        }
        Commands::Ls { path, levels } => {
            let mut rig = rig(&cli.root, SimCamera::ov5640(), Signal::Silence, config);
            rig.initialize_all(true, false)?;
            let store = rig.store();
            println!(
                "{} card, {} of {} bytes used",
                store.card_type_name(),
                store.used_bytes(),
                store.total_bytes()
            );
            for entry in store.list_dir(&path, levels)? {
                print_entry(&entry);
            }
            rig.teardown_all()?;
        }
    }

    Ok(())
}

fn rig(root: &std::path::Path, camera: SimCamera, signal: Signal, config: CaptureConfig) -> Rig {
    CaptureOrchestrator::new(
        camera,
        SimPdm::new(signal),
        HostVolume::new(root),
        MonotonicClock::new(),
        config,
    )
}

fn print_entry(entry: &DirEntry) {
    let depth = entry.path.matches('/').count().saturating_sub(1);
    let indent = "  ".repeat(depth);
    if entry.is_dir {
        println!("{indent}{}/", entry.name());
    } else {
        println!("{indent}{}  {} bytes", entry.name(), entry.size);
    }
}
