//! Charging-rate model.
//!
//! The vehicle reports "minutes to full" per charger tier. Its own estimate
//! already embeds the charge taper, so the remaining percentage divided by the
//! remaining time is a usable first-order average rate. Systematic bias is
//! handled by the learned correction factor, not here.

use soc_traits::ChargingLevel;

use crate::config::EstimatorCfg;
use crate::util::{FULL_SOC, MINUTES_PER_HOUR};

#[inline]
fn usable(t: Option<f64>) -> Option<f64> {
    t.filter(|m| m.is_finite() && *m > 0.0)
}

/// Pick the time-to-full reading that applies to the connected charger.
///
/// The reported level decides when its reading is usable. Otherwise the
/// smaller of two usable readings wins (the active charger finishes first),
/// then whichever single reading is usable.
pub fn select_time_to_full(
    level: Option<ChargingLevel>,
    t_l2: Option<f64>,
    t_l3: Option<f64>,
) -> Option<f64> {
    let l2 = usable(t_l2);
    let l3 = usable(t_l3);

    match level {
        Some(ChargingLevel::DcFast) if l3.is_some() => return l3,
        Some(ChargingLevel::Ac) if l2.is_some() => return l2,
        _ => {}
    }

    match (l2, l3) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (None, Some(b)) => Some(b),
        (Some(a), None) => Some(a),
        (None, None) => None,
    }
}

/// Instantaneous charging rate in %/h with the stock tuning.
pub fn calculate_charging_rate(current_soc: f64, time_to_full_minutes: Option<f64>) -> f64 {
    charging_rate_with(&EstimatorCfg::default(), current_soc, time_to_full_minutes)
}

/// Instantaneous charging rate in %/h.
///
/// Zero when the estimate is missing or shorter than
/// `cfg.min_time_to_full_minutes` (near-zero estimates explode the rate), or
/// when nothing remains to charge. Capped at `cfg.max_charging_rate`.
pub fn charging_rate_with(
    cfg: &EstimatorCfg,
    current_soc: f64,
    time_to_full_minutes: Option<f64>,
) -> f64 {
    let Some(minutes) = time_to_full_minutes.filter(|m| m.is_finite()) else {
        return 0.0;
    };
    if minutes < cfg.min_time_to_full_minutes || minutes <= 0.0 {
        return 0.0;
    }
    if !current_soc.is_finite() {
        return 0.0;
    }
    let remaining = FULL_SOC - current_soc;
    if remaining <= 0.0 {
        return 0.0;
    }
    let rate = remaining / (minutes / MINUTES_PER_HOUR);
    rate.min(cfg.max_charging_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_level_prefers_level3_reading() {
        let t = select_time_to_full(Some(ChargingLevel::DcFast), Some(30.0), Some(90.0));
        assert_eq!(t, Some(90.0));
    }

    #[test]
    fn ac_level_prefers_level2_reading() {
        let t = select_time_to_full(Some(ChargingLevel::Ac), Some(300.0), Some(40.0));
        assert_eq!(t, Some(300.0));
    }

    #[test]
    fn preferred_invalid_falls_back() {
        let t = select_time_to_full(Some(ChargingLevel::DcFast), Some(200.0), Some(0.0));
        assert_eq!(t, Some(200.0));
        let t = select_time_to_full(Some(ChargingLevel::Ac), None, Some(45.0));
        assert_eq!(t, Some(45.0));
    }

    #[test]
    fn unknown_level_takes_smaller() {
        assert_eq!(
            select_time_to_full(Some(ChargingLevel::Unknown), Some(200.0), Some(45.0)),
            Some(45.0)
        );
        assert_eq!(select_time_to_full(None, Some(200.0), None), Some(200.0));
        assert_eq!(select_time_to_full(None, Some(-5.0), Some(0.0)), None);
        assert_eq!(select_time_to_full(None, None, None), None);
    }

    #[test]
    fn rate_is_remaining_over_hours() {
        // 40% remaining in 2 hours
        assert!((calculate_charging_rate(60.0, Some(120.0)) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn rate_zero_cases() {
        assert_eq!(calculate_charging_rate(50.0, None), 0.0);
        assert_eq!(calculate_charging_rate(50.0, Some(0.5)), 0.0);
        assert_eq!(calculate_charging_rate(100.0, Some(60.0)), 0.0);
        assert_eq!(calculate_charging_rate(50.0, Some(f64::NAN)), 0.0);
    }

    #[test]
    fn rate_is_capped() {
        // 99% in one minute would be 5940 %/h
        assert_eq!(calculate_charging_rate(1.0, Some(1.0)), 300.0);
    }
}
