//! Read-only SOC projection from the last accepted baseline.

use chrono::{DateTime, Utc};
use soc_traits::clock::hours_between;

use crate::config::EstimatorCfg;
use crate::state::EstimationState;
use crate::util::{FULL_SOC, round1};

/// Best estimate of the current SOC, or `None` without a baseline.
///
/// - Negative elapsed time (clock moved back): the baseline, untouched.
/// - Idle with a learned drain: linear drain, floored at 0, no staleness
///   ceiling (the daily deep refresh bounds how long this runs unconfirmed).
/// - Charging curves freeze once the baseline is older than the stale
///   threshold.
/// - Charging: `baseline + rate * correction * hours`, capped at the target.
///
/// Everything but the negative-interval case is rounded to 0.1.
pub fn extrapolate(
    state: &EstimationState,
    cfg: &EstimatorCfg,
    now: DateTime<Utc>,
) -> Option<f64> {
    let (baseline, since) = state.baseline()?;

    let elapsed_h = hours_between(since, now);
    if elapsed_h < 0.0 {
        return Some(baseline);
    }

    let drain = state.idle_drain_rate_pct_per_hour();
    if state.is_idle() && drain > 0.0 {
        let est = (baseline - drain * elapsed_h).max(0.0);
        return Some(round1(est));
    }

    if elapsed_h > cfg.stale_threshold_hours {
        tracing::trace!(elapsed_h, "charging estimate stale; holding baseline");
        return Some(round1(baseline));
    }

    let rate = state.charging_rate_pct_per_hour();
    if !state.is_charging() || rate <= 0.0 {
        return Some(round1(baseline));
    }

    let target = state.target_soc();
    if baseline >= target {
        return Some(round1(baseline));
    }

    let est = baseline + rate * state.learned_correction_factor() * elapsed_h;
    let ceiling = target.min(FULL_SOC);
    Some(round1(est.clamp(0.0, ceiling)))
}
