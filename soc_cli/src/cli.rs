//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Config used when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG: &str = "etc/socx.toml";

#[derive(Parser, Debug)]
#[command(name = "socx", version, about = "Vehicle SOC extrapolation CLI")]
pub struct Cli {
    /// Path to config TOML (defaults to etc/socx.toml when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print results and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Feed recorded telemetry through the estimator at its own timestamps
    Replay {
        /// Telemetry CSV (strict header)
        #[arg(long, value_name = "FILE")]
        samples: PathBuf,
        /// Start from and write the final state to this JSON file
        #[arg(long, value_name = "FILE")]
        state: Option<PathBuf>,
    },
    /// Drive a simulated vehicle through a charge and park cycle
    Simulate {
        /// Simulated duration in hours
        #[arg(long, default_value_t = 24.0)]
        hours: f64,
        /// Simulation step in minutes
        #[arg(long = "step-mins", default_value_t = 5)]
        step_mins: u32,
        /// SOC at the start of the run
        #[arg(long = "start-soc", default_value_t = 30.0)]
        start_soc: f64,
        /// Hours spent plugged in before the vehicle is parked
        #[arg(long = "charge-hours", default_value_t = 3.0)]
        charge_hours: f64,
        /// Reported time-to-full divided by the true one
        #[arg(long = "ttf-bias", default_value_t = 1.2)]
        ttf_bias: f64,
        /// How often the simulated API refreshes its cached snapshot (minutes)
        #[arg(long = "report-mins", default_value_t = 60)]
        report_mins: u32,
    },
    /// Show a persisted state and the estimate it yields
    Inspect {
        /// Persisted state JSON (defaults to storage.state_file)
        #[arg(long, value_name = "FILE")]
        state: Option<PathBuf>,
        /// Evaluate at this RFC 3339 instant instead of now
        #[arg(long, value_name = "RFC3339")]
        at: Option<String>,
    },
    /// Validate the configuration and report OK
    Health,
}
