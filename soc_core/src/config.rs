//! Configuration types for the estimation engine.
//!
//! These are the runtime configuration structs used by `SocEngine` and the
//! driver. They are separate from the TOML-deserialized config in `soc_config`.

use std::time::Duration;

/// Tuning of the rate model, learner and extrapolator.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorCfg {
    /// Charging extrapolation freezes after this many hours without a sample.
    pub stale_threshold_hours: f64,
    /// Cap on the derived charging rate (%/h).
    pub max_charging_rate: f64,
    /// Time-to-full estimates below this many minutes yield a zero rate.
    pub min_time_to_full_minutes: f64,
    /// EMA weight of a new correction-factor observation.
    pub correction_alpha: f64,
    /// Correction factor clamp, low end.
    pub min_correction: f64,
    /// Correction factor clamp, high end.
    pub max_correction: f64,
    /// Minimum charging interval (hours) before learning.
    pub min_learning_hours: f64,
    /// SOC changes below this many points are noise.
    pub min_soc_change: f64,
    /// Idle drain rate before anything has been learned (%/h).
    pub default_idle_drain: f64,
    /// Idle drain clamp, high end (%/h).
    pub max_idle_drain: f64,
    /// EMA weight of a new idle-drain observation.
    pub idle_drain_alpha: f64,
    /// Minimum idle interval (hours) before learning.
    pub min_idle_learning_hours: f64,
}

impl Default for EstimatorCfg {
    fn default() -> Self {
        Self {
            stale_threshold_hours: 2.0,
            max_charging_rate: 300.0,
            min_time_to_full_minutes: 1.0,
            correction_alpha: 0.3,
            min_correction: 0.5,
            max_correction: 1.5,
            min_learning_hours: 0.05,
            min_soc_change: 0.5,
            default_idle_drain: 0.04,
            max_idle_drain: 0.5,
            idle_drain_alpha: 0.2,
            min_idle_learning_hours: 1.0,
        }
    }
}

impl EstimatorCfg {
    /// Neutral correction factor (no correction).
    pub const DEFAULT_CORRECTION: f64 = 1.0;
}

/// Cadence of the driver's timers.
#[derive(Debug, Clone)]
pub struct ScheduleCfg {
    /// Re-evaluate and publish the estimate this often.
    pub tick: Duration,
    /// Pull a telemetry snapshot this often.
    pub poll: Duration,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(60),
            poll: Duration::from_secs(300),
        }
    }
}

/// Daily deep refresh policy.
#[derive(Debug, Clone)]
pub struct DeepRefreshCfg {
    pub enabled: bool,
    /// Inclusive UTC hour range the daily slot is drawn from.
    pub window_start_hour: u32,
    pub window_end_hour: u32,
    /// Skip the refresh when the baseline is younger than this.
    pub min_hours_since_update: f64,
    /// Pinned `(hour, minute)`; `None` draws a random slot at startup.
    pub fixed_slot: Option<(u32, u32)>,
}

impl Default for DeepRefreshCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            window_start_hour: 2,
            window_end_hour: 5,
            min_hours_since_update: 24.0,
            fixed_slot: None,
        }
    }
}
