#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and recorded-telemetry parsing for the SOC estimator.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//!   Every section is optional; an empty file yields the stock tuning.
//! - Telemetry CSV loader enforces headers and time ordering so a replay
//!   never feeds the engine samples out of order.
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EstimatorCfg {
    /// Stop extrapolating a charge curve after this many hours without a sample
    pub stale_threshold_hours: f64,
    /// Upper bound on the derived charging rate (%/h)
    pub max_charging_rate_pct_per_hour: f64,
    /// Time-to-full estimates below this are treated as unusable (minutes)
    pub min_time_to_full_minutes: f64,
    /// EMA weight for new correction-factor observations
    pub correction_alpha: f64,
    pub min_correction: f64,
    pub max_correction: f64,
    /// Shorter charging intervals are ignored for learning (hours)
    pub min_learning_hours: f64,
    /// SOC changes below this many points are treated as noise
    pub min_soc_change: f64,
    pub default_idle_drain_pct_per_hour: f64,
    pub max_idle_drain_pct_per_hour: f64,
    /// EMA weight for new idle-drain observations
    pub idle_drain_alpha: f64,
    /// Shorter idle intervals are ignored for learning (hours)
    pub min_idle_learning_hours: f64,
}

impl Default for EstimatorCfg {
    fn default() -> Self {
        Self {
            stale_threshold_hours: 2.0,
            max_charging_rate_pct_per_hour: 300.0,
            min_time_to_full_minutes: 1.0,
            correction_alpha: 0.3,
            min_correction: 0.5,
            max_correction: 1.5,
            min_learning_hours: 0.05,
            min_soc_change: 0.5,
            default_idle_drain_pct_per_hour: 0.04,
            max_idle_drain_pct_per_hour: 0.5,
            idle_drain_alpha: 0.2,
            min_idle_learning_hours: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScheduleCfg {
    /// Re-evaluate the extrapolated value this often (seconds)
    pub tick_secs: u64,
    /// Pull a telemetry snapshot this often (seconds)
    pub poll_secs: u64,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            tick_secs: 60,
            poll_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeepRefreshCfg {
    pub enabled: bool,
    /// First hour (UTC) of the randomized daily window
    pub window_start_hour: u32,
    /// Last hour (UTC, inclusive) of the randomized daily window
    pub window_end_hour: u32,
    /// Only wake the vehicle when the baseline is older than this
    pub min_hours_since_update: f64,
    /// Optional fixed slot; when both are set no randomization happens
    pub hour: Option<u32>,
    pub minute: Option<u32>,
}

impl Default for DeepRefreshCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            window_start_hour: 2,
            window_end_hour: 5,
            min_hours_since_update: 24.0,
            hour: None,
            minute: None,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Storage {
    /// Where the estimation state is persisted (JSON)
    pub state_file: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub estimator: EstimatorCfg,
    pub schedule: ScheduleCfg,
    pub deep_refresh: DeepRefreshCfg,
    pub logging: Logging,
    pub storage: Storage,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()
        .map_err(|e| e.wrap_err(format!("invalid config {path:?}")))?;
    Ok(cfg)
}

fn finite_non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        let e = &self.estimator;

        // Estimator
        if !(e.stale_threshold_hours.is_finite() && e.stale_threshold_hours > 0.0) {
            eyre::bail!("estimator.stale_threshold_hours must be > 0");
        }
        if !(e.max_charging_rate_pct_per_hour.is_finite() && e.max_charging_rate_pct_per_hour > 0.0)
        {
            eyre::bail!("estimator.max_charging_rate_pct_per_hour must be > 0");
        }
        if !finite_non_negative(e.min_time_to_full_minutes) {
            eyre::bail!("estimator.min_time_to_full_minutes must be >= 0");
        }
        if !(e.correction_alpha > 0.0 && e.correction_alpha <= 1.0) {
            eyre::bail!("estimator.correction_alpha must be in (0.0, 1.0]");
        }
        if !(e.idle_drain_alpha > 0.0 && e.idle_drain_alpha <= 1.0) {
            eyre::bail!("estimator.idle_drain_alpha must be in (0.0, 1.0]");
        }
        if !(e.min_correction > 0.0 && e.min_correction <= 1.0) {
            eyre::bail!("estimator.min_correction must be in (0.0, 1.0]");
        }
        if !(e.max_correction.is_finite() && e.max_correction >= 1.0) {
            eyre::bail!("estimator.max_correction must be >= 1.0");
        }
        if !finite_non_negative(e.min_learning_hours) {
            eyre::bail!("estimator.min_learning_hours must be >= 0");
        }
        if !finite_non_negative(e.min_idle_learning_hours) {
            eyre::bail!("estimator.min_idle_learning_hours must be >= 0");
        }
        if !finite_non_negative(e.min_soc_change) {
            eyre::bail!("estimator.min_soc_change must be >= 0");
        }
        if !finite_non_negative(e.max_idle_drain_pct_per_hour) {
            eyre::bail!("estimator.max_idle_drain_pct_per_hour must be >= 0");
        }
        if !finite_non_negative(e.default_idle_drain_pct_per_hour)
            || e.default_idle_drain_pct_per_hour > e.max_idle_drain_pct_per_hour
        {
            eyre::bail!(
                "estimator.default_idle_drain_pct_per_hour must be in [0, max_idle_drain_pct_per_hour]"
            );
        }

        // Schedule
        if self.schedule.tick_secs == 0 {
            eyre::bail!("schedule.tick_secs must be >= 1");
        }
        if self.schedule.tick_secs > 24 * 60 * 60 {
            eyre::bail!("schedule.tick_secs is unreasonably large (>24h)");
        }
        if self.schedule.poll_secs == 0 {
            eyre::bail!("schedule.poll_secs must be >= 1");
        }
        if self.schedule.poll_secs > 24 * 60 * 60 {
            eyre::bail!("schedule.poll_secs is unreasonably large (>24h)");
        }

        // Deep refresh
        let d = &self.deep_refresh;
        if d.window_start_hour > 23 || d.window_end_hour > 23 {
            eyre::bail!("deep_refresh window hours must be in [0, 23]");
        }
        if d.window_start_hour > d.window_end_hour {
            eyre::bail!("deep_refresh.window_start_hour must be <= window_end_hour");
        }
        if !finite_non_negative(d.min_hours_since_update) {
            eyre::bail!("deep_refresh.min_hours_since_update must be >= 0");
        }
        if let Some(h) = d.hour
            && h > 23
        {
            eyre::bail!("deep_refresh.hour must be in [0, 23]");
        }
        if let Some(m) = d.minute
            && m > 59
        {
            eyre::bail!("deep_refresh.minute must be in [0, 59]");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

/// Recorded telemetry CSV schema.
///
/// Expected headers:
/// timestamp,soc,is_charging,ignition_on,charging_level,time_to_full_l2,time_to_full_l3
///
/// Empty cells mean "not reported". Example:
/// 2024-05-01T18:00:00Z,60.0,true,false,LEVEL_2,120,
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryRow {
    pub timestamp: DateTime<Utc>,
    pub soc: Option<f64>,
    pub is_charging: bool,
    pub ignition_on: bool,
    pub charging_level: Option<String>,
    pub time_to_full_l2: Option<f64>,
    pub time_to_full_l3: Option<f64>,
}

const TELEMETRY_HEADERS: [&str; 7] = [
    "timestamp",
    "soc",
    "is_charging",
    "ignition_on",
    "charging_level",
    "time_to_full_l2",
    "time_to_full_l3",
];

pub fn load_telemetry_csv(path: &std::path::Path) -> eyre::Result<Vec<TelemetryRow>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open telemetry CSV {:?}: {}", path, e))?;
    read_telemetry(rdr).map_err(|e| e.wrap_err(format!("telemetry CSV {path:?}")))
}

/// Parse telemetry rows from any reader (same rules as `load_telemetry_csv`).
pub fn parse_telemetry_csv<R: std::io::Read>(input: R) -> eyre::Result<Vec<TelemetryRow>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    read_telemetry(rdr)
}

fn read_telemetry<R: std::io::Read>(mut rdr: csv::Reader<R>) -> eyre::Result<Vec<TelemetryRow>> {
    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers: {}", e))?
        .clone();
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != TELEMETRY_HEADERS {
        eyre::bail!(
            "telemetry CSV must have headers '{}', got: {}",
            TELEMETRY_HEADERS.join(","),
            actual.join(",")
        );
    }

    let mut rows: Vec<TelemetryRow> = Vec::new();
    for (idx, rec) in rdr.deserialize::<TelemetryRow>().enumerate() {
        let row = rec.map_err(|e| eyre::eyre!("invalid CSV row {}: {}", idx + 2, e))?;
        if let Some(prev) = rows.last()
            && row.timestamp < prev.timestamp
        {
            eyre::bail!(
                "telemetry rows must be in time order (row {} is earlier than row {})",
                idx + 2,
                idx + 1
            );
        }
        rows.push(row);
    }
    Ok(rows)
}
