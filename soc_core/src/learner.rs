//! Self-calibration: two single-pole EMAs fed from accepted samples.
//!
//! Both rules must run *before* the baseline is overwritten, with the mode
//! that was in effect during the interval being measured. A sample that
//! marks a transition (e.g. charger unplugged) still credits the preceding
//! regime.

use chrono::{DateTime, Utc};
use soc_traits::clock::hours_between;

use crate::config::EstimatorCfg;
use crate::state::EstimationState;

/// Update the charging correction factor from the interval that just ended.
///
/// Returns the new factor when an update happened.
pub fn learn_correction_factor(
    state: &mut EstimationState,
    cfg: &EstimatorCfg,
    current_soc: f64,
    now: DateTime<Utc>,
    was_charging: bool,
) -> Option<f64> {
    let rate = state.charging_rate_pct_per_hour();
    if !was_charging || rate <= 0.0 {
        return None;
    }
    let (last_soc, last_time) = state.baseline()?;

    let elapsed_h = hours_between(last_time, now);
    // Short intervals are dominated by clock skew between us and the API.
    if elapsed_h < cfg.min_learning_hours {
        return None;
    }

    let actual = current_soc - last_soc;
    if actual < cfg.min_soc_change {
        return None;
    }
    let expected = rate * elapsed_h;
    if expected < cfg.min_soc_change || expected <= 0.0 {
        return None;
    }

    let observed = (actual / expected).clamp(cfg.min_correction, cfg.max_correction);
    let previous = state.learned_correction_factor();
    let updated = cfg.correction_alpha * observed + (1.0 - cfg.correction_alpha) * previous;
    state.set_correction_factor(updated, cfg);

    tracing::debug!(
        factor = state.learned_correction_factor(),
        actual,
        expected,
        elapsed_h,
        "updated charging correction factor"
    );
    Some(state.learned_correction_factor())
}

/// Update the idle drain rate from the idle interval that just ended.
///
/// Returns the new rate when an update happened.
pub fn learn_idle_drain_rate(
    state: &mut EstimationState,
    cfg: &EstimatorCfg,
    current_soc: f64,
    now: DateTime<Utc>,
    was_idle: bool,
) -> Option<f64> {
    if !was_idle {
        return None;
    }
    let (last_soc, last_time) = state.baseline()?;

    let elapsed_h = hours_between(last_time, now);
    if elapsed_h < cfg.min_idle_learning_hours || elapsed_h <= 0.0 {
        return None;
    }

    let drain = last_soc - current_soc;
    if drain < cfg.min_soc_change {
        return None;
    }

    let observed = (drain / elapsed_h).clamp(0.0, cfg.max_idle_drain);
    let previous = state.idle_drain_rate_pct_per_hour();
    let updated = cfg.idle_drain_alpha * observed + (1.0 - cfg.idle_drain_alpha) * previous;
    state.set_idle_drain_rate(updated, cfg);

    tracing::debug!(
        drain_rate = state.idle_drain_rate_pct_per_hour(),
        drain,
        elapsed_h,
        "updated idle drain rate"
    );
    Some(state.idle_drain_rate_pct_per_hour())
}
