//! Small numeric helpers shared by the estimator modules.

/// Upper bound of the state-of-charge scale.
pub const FULL_SOC: f64 = 100.0;
/// Minutes per hour.
pub const MINUTES_PER_HOUR: f64 = 60.0;

/// Round to one decimal place (ties away from zero).
#[inline]
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Clamp to `[lo, hi]`, mapping NaN to `fallback`.
#[inline]
pub fn clamp_or(x: f64, lo: f64, hi: f64, fallback: f64) -> f64 {
    if x.is_nan() { fallback } else { x.clamp(lo, hi) }
}

/// A SOC reading usable as ground truth: finite and within `[0, 100]`.
#[inline]
pub fn valid_soc(soc: Option<f64>) -> Option<f64> {
    soc.filter(|s| s.is_finite() && (0.0..=FULL_SOC).contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_one_decimal() {
        assert_eq!(round1(79.04), 79.0);
        assert_eq!(round1(12.26), 12.3);
        assert_eq!(round1(53.333), 53.3);
    }

    #[test]
    fn clamp_or_handles_nan() {
        assert_eq!(clamp_or(f64::NAN, 0.5, 1.5, 1.0), 1.0);
        assert_eq!(clamp_or(2.0, 0.5, 1.5, 1.0), 1.5);
        assert_eq!(clamp_or(f64::NEG_INFINITY, 0.0, 0.5, 0.04), 0.0);
    }

    #[test]
    fn valid_soc_filters_impossible_readings() {
        assert_eq!(valid_soc(Some(55.0)), Some(55.0));
        assert_eq!(valid_soc(Some(-1.0)), None);
        assert_eq!(valid_soc(Some(100.5)), None);
        assert_eq!(valid_soc(Some(f64::NAN)), None);
        assert_eq!(valid_soc(None), None);
    }
}
