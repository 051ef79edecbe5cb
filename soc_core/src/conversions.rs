//! `From` implementations bridging `soc_config` types to `soc_core` types.

use std::time::Duration;

use crate::config::{DeepRefreshCfg, EstimatorCfg, ScheduleCfg};

// ── EstimatorCfg ─────────────────────────────────────────────────────────────

impl From<&soc_config::EstimatorCfg> for EstimatorCfg {
    fn from(c: &soc_config::EstimatorCfg) -> Self {
        Self {
            stale_threshold_hours: c.stale_threshold_hours,
            max_charging_rate: c.max_charging_rate_pct_per_hour,
            min_time_to_full_minutes: c.min_time_to_full_minutes,
            correction_alpha: c.correction_alpha,
            min_correction: c.min_correction,
            max_correction: c.max_correction,
            min_learning_hours: c.min_learning_hours,
            min_soc_change: c.min_soc_change,
            default_idle_drain: c.default_idle_drain_pct_per_hour,
            max_idle_drain: c.max_idle_drain_pct_per_hour,
            idle_drain_alpha: c.idle_drain_alpha,
            min_idle_learning_hours: c.min_idle_learning_hours,
        }
    }
}

// ── ScheduleCfg ──────────────────────────────────────────────────────────────

impl From<&soc_config::ScheduleCfg> for ScheduleCfg {
    fn from(c: &soc_config::ScheduleCfg) -> Self {
        Self {
            tick: Duration::from_secs(c.tick_secs),
            poll: Duration::from_secs(c.poll_secs),
        }
    }
}

// ── DeepRefreshCfg ───────────────────────────────────────────────────────────

impl From<&soc_config::DeepRefreshCfg> for DeepRefreshCfg {
    fn from(c: &soc_config::DeepRefreshCfg) -> Self {
        Self {
            enabled: c.enabled,
            window_start_hour: c.window_start_hour,
            window_end_hour: c.window_end_hour,
            min_hours_since_update: c.min_hours_since_update,
            // A slot is pinned only when both halves are given.
            fixed_slot: c.hour.zip(c.minute),
        }
    }
}
