//! gps-tracker CLI
//!
//! Runs the location agent over simulated providers and inspects the
//! day files it writes.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::{info, warn};

use gps_tracker::logging::{self, DEFAULT_FILTER};
use gps_tracker::{
    inspect_log_dir, AgentConfig, AgentError, ConfigError, LogError, PositionProvider,
    ProviderChain, ProviderId, SchedulerState, SimulatedProvider, TrackingAgent,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Cannot read log directory: {0}")]
    Logs(#[from] LogError),

    #[error("Cannot encode output: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Parser)]
#[command(name = "gps-tracker")]
#[command(about = "Record position fixes to daily text files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the agent over simulated providers
    ///
    /// Stops on Ctrl-C, after --duration-secs, or when location permission
    /// is lost.
    Run(RunArgs),

    /// Show the state of the log directory
    Status {
        /// Configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the log directory
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration as JSON
    Config,
}

#[derive(Args)]
struct RunArgs {
    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the log directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Pull cadence in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Minimum displacement in meters
    #[arg(long)]
    min_distance: Option<f64>,

    /// Stop after this many seconds
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Starting latitude of the simulated receiver
    #[arg(long, default_value = "47.4979", allow_hyphen_values = true)]
    lat: f64,

    /// Starting longitude of the simulated receiver
    #[arg(long, default_value = "19.0402", allow_hyphen_values = true)]
    lon: f64,

    /// Ground speed of the simulated receiver (m/s)
    #[arg(long, default_value = "1.4")]
    speed: f64,

    /// Heading of the simulated receiver (degrees from north)
    #[arg(long, default_value = "90.0")]
    bearing: f64,
}

fn load_config(path: Option<&PathBuf>, log_dir: Option<PathBuf>) -> Result<AgentConfig, CliError> {
    let mut config = match path {
        Some(path) => AgentConfig::load_from_file(path)?,
        None => AgentConfig::default(),
    };
    if let Some(log_dir) = log_dir {
        config.log_dir = log_dir;
    }
    Ok(config)
}

async fn run_agent(args: RunArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_ref(), args.log_dir.clone())?;
    if let Some(interval_ms) = args.interval_ms {
        config.set_pull_interval_ms(interval_ms)?;
    }
    if let Some(min_distance) = args.min_distance {
        config.set_min_distance_m(min_distance)?;
    }
    config.validate()?;

    let gps: Arc<dyn PositionProvider> = Arc::new(
        SimulatedProvider::new(ProviderId::gps(), args.lat, args.lon)
            .with_motion(args.speed, args.bearing)
            .with_accuracy(4.0),
    );
    let network: Arc<dyn PositionProvider> = Arc::new(
        SimulatedProvider::new(ProviderId::network(), args.lat, args.lon)
            .with_motion(args.speed, args.bearing)
            .with_accuracy(35.0),
    );
    let providers = ProviderChain::with_preference(vec![gps, network], &config.provider_order);

    let mut agent = TrackingAgent::new(config, providers);
    agent.start()?;
    info!("Agent running; press Ctrl-C to stop");

    let run_for = args.duration_secs.map(Duration::from_secs);
    let deadline = async move {
        match run_for {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let mut watch = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Cannot listen for Ctrl-C");
                }
                break;
            }
            _ = &mut deadline => break,
            _ = watch.tick() => {
                if agent.state() == SchedulerState::Stopped {
                    warn!("Agent halted");
                    break;
                }
            }
        }
    }

    agent.stop().await?;
    let status = agent.status()?;
    let snapshot = &status.snapshot;
    println!(
        "Accepted: {}  Rejected: {}  Invalid: {}  Write failures: {}  Dropped: {}",
        snapshot.accepted,
        snapshot.rejected,
        snapshot.invalid,
        snapshot.write_failures,
        snapshot.dropped_events
    );
    if let Some(error) = &snapshot.last_provider_error {
        println!("Last provider error: {}", error);
    }
    if let Some(halt) = &snapshot.halt {
        println!("Halted: {:?}", halt);
    }
    println!("{}", status.logs);
    Ok(())
}

fn show_status(config: Option<PathBuf>, log_dir: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let config = load_config(config.as_ref(), log_dir)?;
    let logs = inspect_log_dir(&config.log_dir)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&logs)?);
    } else {
        println!("Directory: {}", config.log_dir.display());
        println!("{}", logs);
    }
    Ok(())
}

fn show_default_config() -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(&AgentConfig::default())?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(DEFAULT_FILTER) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    let result = match cli.command {
        Command::Run(args) => run_agent(args).await,
        Command::Status {
            config,
            log_dir,
            json,
        } => show_status(config, log_dir, json),
        Command::Config => show_default_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
