//! CLI entry point for thrust-daq
//!
//! Provides two commands:
//! - `record`: run one recording session and save it as CSV
//! - `receive`: print the telemetry a running stand forwards
//!
//! # Usage
//!
//! Record 10 s at 50 ms, streaming to a receiver on the bench laptop:
//! ```bash
//! thrust-daq record --duration 10 --period 50 --output static_run --peer 192.168.4.2:4210
//! ```
//!
//! Listen for telemetry:
//! ```bash
//! thrust-daq receive --bind 0.0.0.0:4210
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, IsTerminal, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thrust_daq::config::{Settings, DEFAULT_CONFIG_PATH};
use thrust_daq::data::storage::with_csv_extension;
use thrust_daq::hardware::{MockLoadCell, MockPowerMonitor};
use thrust_daq::logging::{self, OutputFormat, TracingConfig};
use thrust_daq::measurement::AcquisitionMode;
use thrust_daq::shutdown::StopReason;
use thrust_daq::transport::{NullTransport, TelemetryReceiver, UdpTransport, WirelessTransport};
use thrust_daq::{DaqError, Devices, SessionController, SessionSettings};

#[derive(Parser)]
#[command(name = "thrust-daq")]
#[command(about = "Thrust stand load-cell and power recorder", long_about = None)]
struct Cli {
    /// Log output format (pretty, compact, json)
    #[arg(long, global = true, default_value = "compact")]
    log_format: String,

    /// Disable colors in the pretty log format
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Load cell only
    LoadCell,
    /// Load cell plus voltage/current monitor
    Power,
}

impl From<ModeArg> for AcquisitionMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::LoadCell => AcquisitionMode::LoadCell,
            ModeArg::Power => AcquisitionMode::LoadCellAndPower,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Record one session against the simulated stand
    Record {
        /// Recording duration in seconds (prompted if omitted)
        #[arg(long)]
        duration: Option<u64>,

        /// Sample period in milliseconds
        #[arg(long)]
        period: Option<u64>,

        /// Output file name; `.csv` is appended when missing (prompted if omitted)
        #[arg(long)]
        output: Option<String>,

        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Telemetry receiver, `host:port`
        #[arg(long)]
        peer: Option<String>,

        /// Disable telemetry even if configured
        #[arg(long)]
        no_telemetry: bool,

        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Raw ADC count reported by the simulated load cell
        #[arg(long, default_value_t = 100, allow_hyphen_values = true)]
        raw_force: i32,

        /// Bus voltage reported by the simulated power monitor
        #[arg(long, default_value_t = 16.8)]
        voltage: f64,

        /// Current reported by the simulated power monitor
        #[arg(long, default_value_t = 10.0)]
        current: f64,
    },

    /// Print forwarded telemetry until the stand reports completion
    Receive {
        #[arg(long, default_value = "0.0.0.0:4210")]
        bind: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format: OutputFormat = cli.log_format.parse()?;

    match cli.command {
        Commands::Record {
            duration,
            period,
            output,
            mode,
            peer,
            no_telemetry,
            config,
            raw_force,
            voltage,
            current,
        } => {
            let mut settings = Settings::load_from(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            logging::init(
                TracingConfig::from_settings(&settings)?
                    .with_format(format)
                    .with_ansi(!cli.no_color),
            )?;
            tracing::info!(
                stand = %settings.application.name,
                config = %config.display(),
                "configuration loaded"
            );

            let interactive = io::stdin().is_terminal();
            settings.session.duration_seconds = match duration {
                Some(seconds) => seconds,
                None if interactive => prompt_duration()?,
                None => settings.session.duration_seconds,
            };
            if let Some(period) = period {
                settings.session.sample_period_ms = period;
            }
            if let Some(mode) = mode {
                settings.session.mode = mode.into();
            }
            if let Some(peer) = peer {
                settings.telemetry.peer = Some(peer);
                settings.telemetry.enabled = true;
            }
            if no_telemetry {
                settings.telemetry.enabled = false;
            }

            let output = match output {
                Some(name) => name,
                None if interactive => prompt("Enter filename to save (e.g., thrust_data): ")?,
                None => "thrust_data".to_string(),
            };

            let simulated = SimulatedStand {
                raw_force,
                voltage,
                current,
            };
            record(settings, &output, simulated, interactive).await
        }
        Commands::Receive { bind } => {
            logging::init(
                TracingConfig::default()
                    .with_format(format)
                    .with_ansi(!cli.no_color),
            )?;
            receive(bind).await
        }
    }
}

struct SimulatedStand {
    raw_force: i32,
    voltage: f64,
    current: f64,
}

async fn record(
    settings: Settings,
    output: &str,
    stand: SimulatedStand,
    interactive: bool,
) -> Result<()> {
    let session_settings = SessionSettings::from_settings(&settings)?;

    let mut devices = Devices::load_cell(Arc::new(MockLoadCell::new(stand.raw_force)));
    if session_settings.mode.includes_power() {
        devices = devices.with_power_monitor(Arc::new(MockPowerMonitor::new(
            stand.voltage,
            stand.current,
        )));
    }

    let transport: Arc<dyn WirelessTransport> = if session_settings.telemetry.is_some() {
        Arc::new(UdpTransport::bind(SocketAddr::from(([0, 0, 0, 0], 0))).await?)
    } else {
        Arc::new(NullTransport)
    };

    let mut session = SessionController::new(session_settings, devices, transport)?;

    let stop = session.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop_all(StopReason::External);
        }
    });

    println!(
        "Sensor recording will occur for {} seconds",
        settings.session.duration_seconds
    );
    let summary = session.record().await?;
    match summary.reason {
        StopReason::BufferFull => println!("Data collection complete."),
        StopReason::External => println!("Recording stopped early."),
    }
    println!("{} of {} samples captured", summary.samples, summary.capacity);

    let mut target = settings.storage.resolve(with_csv_extension(output));
    loop {
        match session.persist(&target) {
            Ok(path) => {
                println!("Data saved to {}", path.display());
                return Ok(());
            }
            Err(DaqError::Persist(e)) if interactive => {
                eprintln!("Error saving data: {e}");
                let name = prompt("Enter another filename (blank to give up): ")?;
                if name.is_empty() {
                    return Err(DaqError::Persist(e).into());
                }
                target = settings.storage.resolve(with_csv_extension(&name));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn receive(bind: SocketAddr) -> Result<()> {
    let mut receiver = TelemetryReceiver::bind(bind).await?;
    println!("Listening for telemetry on {}", receiver.local_addr()?);

    while let Some((from, text)) = receiver.recv().await? {
        tracing::trace!(%from, "telemetry received");
        println!("{text}");
    }
    Ok(())
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_duration() -> Result<u64> {
    loop {
        let answer = prompt("Enter recording duration (seconds): ")?;
        match answer.parse::<u64>() {
            Ok(seconds) if seconds > 0 => return Ok(seconds),
            _ => eprintln!("Please enter a whole number of seconds greater than 0."),
        }
    }
}
