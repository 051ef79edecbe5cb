//! `socx`: replay, simulate and inspect the SOC estimator from the command line.

mod cli;
mod error_fmt;
mod inspect;
mod replay;
mod simulate;

use clap::Parser;
use cli::{Cli, Commands, DEFAULT_CONFIG, FILE_GUARD, JSON_MODE};
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use eyre::WrapErr;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// `12.3` or `-` for display.
pub(crate) fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{x:.1}"))
}

fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    let _ = JSON_MODE.set(json);

    if let Err(e) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(json) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    color_eyre::install()?;
    let cfg = load_config(cli.config.as_deref())?;
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging)?;

    match cli.cmd {
        Commands::Replay { samples, state } => {
            replay::run_replay(&cfg, &samples, state.as_deref(), cli.json)?;
        }
        Commands::Simulate {
            hours,
            step_mins,
            start_soc,
            charge_hours,
            ttf_bias,
            report_mins,
        } => {
            simulate::run_simulate(
                &cfg,
                simulate::SimParams {
                    hours,
                    step_mins,
                    start_soc,
                    charge_hours,
                    ttf_bias,
                    report_mins,
                },
                cli.json,
            )?;
        }
        Commands::Inspect { state, at } => {
            let state = state_path(&cfg, state)?;
            inspect::run_inspect(&cfg, &state, at.as_deref(), cli.json)?;
        }
        Commands::Health => {
            if cli.json {
                println!("{}", serde_json::json!({ "status": "ok" }));
            } else {
                println!("OK");
            }
        }
    }
    Ok(())
}

/// Explicit `--config` must exist; the default path is optional.
fn load_config(path: Option<&Path>) -> eyre::Result<soc_config::Config> {
    match path {
        Some(p) => soc_config::load_file(p),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            soc_config::load_file(Path::new(DEFAULT_CONFIG))
        }
        None => {
            let cfg = soc_config::Config::default();
            cfg.validate().wrap_err("invalid default config")?;
            Ok(cfg)
        }
    }
}

/// `--state`, else `storage.state_file` from the config.
fn state_path(cfg: &soc_config::Config, explicit: Option<PathBuf>) -> eyre::Result<PathBuf> {
    explicit
        .or_else(|| cfg.storage.state_file.as_ref().map(PathBuf::from))
        .ok_or_else(|| eyre::eyre!("--state is required when storage.state_file is not configured"))
}

fn init_tracing(
    json: bool,
    cli_level: Option<&str>,
    logging: &soc_config::Logging,
) -> eyre::Result<()> {
    let level = cli_level
        .or(logging.level.as_deref())
        .unwrap_or("info");
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::try_from_default_env()?,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| eyre::eyre!("invalid log level {level:?}: {e}"))?,
    };

    let console = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let file = match logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file {path:?} has no file name"))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(filter)
        .try_init()
        .map_err(|e| eyre::eyre!("install tracing subscriber: {e}"))?;
    Ok(())
}
