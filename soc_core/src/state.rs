//! Everything the engine remembers between samples, and its persisted form.
//!
//! Fields are private: every write goes through a setter that clamps to the
//! configured range, so an out-of-range value can never be stored. Restoring
//! from a persisted blob validates each field on its own and substitutes the
//! default for anything malformed, so a damaged blob degrades the estimate
//! instead of failing the load.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::config::EstimatorCfg;
use crate::util::{FULL_SOC, clamp_or};

/// Persisted keys.
pub mod keys {
    pub const LAST_ACTUAL_SOC: &str = "last_actual_soc";
    pub const LAST_ACTUAL_SOC_TIME: &str = "last_actual_soc_time";
    pub const IS_CHARGING: &str = "is_charging";
    pub const IS_IDLE: &str = "is_idle";
    pub const CHARGING_RATE: &str = "charging_rate_pct_per_hour";
    pub const IDLE_DRAIN_RATE: &str = "idle_drain_rate_pct_per_hour";
    pub const CORRECTION_FACTOR: &str = "learned_correction_factor";
    /// Name used by older releases for the correction factor.
    pub const LEGACY_CORRECTION_FACTOR: &str = "learned_efficiency";
    pub const TARGET_SOC: &str = "target_soc";
    /// Informational; written with snapshots, ignored on restore.
    pub const LAST_ESTIMATED_SOC: &str = "last_estimated_soc";
}

/// Operating regime of the vehicle as far as the estimator is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Charging,
    /// Not charging and ignition off.
    Idle,
    /// Driving, or anything else that is neither charging nor idle.
    Active,
}

impl Mode {
    pub fn from_flags(is_charging: bool, ignition_on: bool) -> Self {
        if is_charging {
            Self::Charging
        } else if ignition_on {
            Self::Active
        } else {
            Self::Idle
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimationState {
    last_actual_soc: Option<f64>,
    last_actual_soc_time: Option<DateTime<Utc>>,
    is_charging: bool,
    is_idle: bool,
    charging_rate_pct_per_hour: f64,
    idle_drain_rate_pct_per_hour: f64,
    learned_correction_factor: f64,
    target_soc: f64,
}

impl Default for EstimationState {
    fn default() -> Self {
        Self::new(&EstimatorCfg::default())
    }
}

impl EstimationState {
    /// Fresh state: no baseline, neutral correction, default idle drain.
    pub fn new(cfg: &EstimatorCfg) -> Self {
        Self {
            last_actual_soc: None,
            last_actual_soc_time: None,
            is_charging: false,
            is_idle: false,
            charging_rate_pct_per_hour: 0.0,
            idle_drain_rate_pct_per_hour: clamp_or(
                cfg.default_idle_drain,
                0.0,
                cfg.max_idle_drain,
                0.0,
            ),
            learned_correction_factor: EstimatorCfg::DEFAULT_CORRECTION,
            target_soc: FULL_SOC,
        }
    }

    // ── reads ────────────────────────────────────────────────────────────────

    #[inline]
    pub fn last_actual_soc(&self) -> Option<f64> {
        self.last_actual_soc
    }
    #[inline]
    pub fn last_actual_soc_time(&self) -> Option<DateTime<Utc>> {
        self.last_actual_soc_time
    }
    /// Accepted reading and its time, present together or not at all.
    #[inline]
    pub fn baseline(&self) -> Option<(f64, DateTime<Utc>)> {
        self.last_actual_soc.zip(self.last_actual_soc_time)
    }
    #[inline]
    pub fn is_charging(&self) -> bool {
        self.is_charging
    }
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.is_idle
    }
    pub fn mode(&self) -> Mode {
        if self.is_charging {
            Mode::Charging
        } else if self.is_idle {
            Mode::Idle
        } else {
            Mode::Active
        }
    }
    #[inline]
    pub fn charging_rate_pct_per_hour(&self) -> f64 {
        self.charging_rate_pct_per_hour
    }
    #[inline]
    pub fn idle_drain_rate_pct_per_hour(&self) -> f64 {
        self.idle_drain_rate_pct_per_hour
    }
    #[inline]
    pub fn learned_correction_factor(&self) -> f64 {
        self.learned_correction_factor
    }
    #[inline]
    pub fn target_soc(&self) -> f64 {
        self.target_soc
    }

    // ── clamped writes ───────────────────────────────────────────────────────

    /// Record an accepted reading. The SOC is clamped to `[0, 100]`.
    pub fn set_baseline(&mut self, soc: f64, at: DateTime<Utc>) {
        self.last_actual_soc = Some(clamp_or(soc, 0.0, FULL_SOC, 0.0));
        self.last_actual_soc_time = Some(at);
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.is_charging = mode == Mode::Charging;
        self.is_idle = mode == Mode::Idle;
    }

    pub fn set_charging_rate(&mut self, rate: f64, cfg: &EstimatorCfg) {
        self.charging_rate_pct_per_hour = clamp_or(rate, 0.0, cfg.max_charging_rate, 0.0);
    }

    pub fn set_idle_drain_rate(&mut self, rate: f64, cfg: &EstimatorCfg) {
        self.idle_drain_rate_pct_per_hour =
            clamp_or(rate, 0.0, cfg.max_idle_drain, cfg.default_idle_drain);
    }

    pub fn set_correction_factor(&mut self, factor: f64, cfg: &EstimatorCfg) {
        self.learned_correction_factor = clamp_or(
            factor,
            cfg.min_correction,
            cfg.max_correction,
            EstimatorCfg::DEFAULT_CORRECTION,
        );
    }

    // ── persistence ──────────────────────────────────────────────────────────

    /// Key/value form for the persistence port.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert(keys::LAST_ACTUAL_SOC.into(), opt_number(self.last_actual_soc));
        m.insert(
            keys::LAST_ACTUAL_SOC_TIME.into(),
            self.last_actual_soc_time
                .map(|t| Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
                .unwrap_or(Value::Null),
        );
        m.insert(keys::IS_CHARGING.into(), Value::Bool(self.is_charging));
        m.insert(keys::IS_IDLE.into(), Value::Bool(self.is_idle));
        m.insert(
            keys::CHARGING_RATE.into(),
            number(self.charging_rate_pct_per_hour),
        );
        m.insert(
            keys::IDLE_DRAIN_RATE.into(),
            number(self.idle_drain_rate_pct_per_hour),
        );
        m.insert(
            keys::CORRECTION_FACTOR.into(),
            number(self.learned_correction_factor),
        );
        m.insert(keys::TARGET_SOC.into(), number(self.target_soc));
        m
    }

    /// Restore with the stock tuning.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self::from_map_with(map, &EstimatorCfg::default())
    }

    /// Restore from a persisted blob. Never fails: each field that is missing,
    /// of the wrong type or out of range is replaced by its default.
    pub fn from_map_with(map: &Map<String, Value>, cfg: &EstimatorCfg) -> Self {
        let defaults = Self::new(cfg);

        let soc = field(map, keys::LAST_ACTUAL_SOC, |v| {
            v.as_f64()
                .filter(|s| s.is_finite() && (0.0..=FULL_SOC).contains(s))
        });
        let time = field(map, keys::LAST_ACTUAL_SOC_TIME, |v| {
            v.as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
        });
        let (last_actual_soc, last_actual_soc_time) = match (soc, time) {
            (Some(s), Some(t)) => (Some(s), Some(t)),
            (None, None) => (None, None),
            _ => {
                tracing::warn!("persisted baseline is incomplete; starting without one");
                (None, None)
            }
        };

        let mut is_charging = field(map, keys::IS_CHARGING, Value::as_bool).unwrap_or(false);
        let mut is_idle = field(map, keys::IS_IDLE, Value::as_bool).unwrap_or(false);
        if is_charging && is_idle {
            tracing::warn!("persisted state is both charging and idle; clearing mode");
            is_charging = false;
            is_idle = false;
        }

        let in_range = |lo: f64, hi: f64| {
            move |v: &Value| v.as_f64().filter(|x| x.is_finite() && *x >= lo && *x <= hi)
        };

        let charging_rate_pct_per_hour = field(
            map,
            keys::CHARGING_RATE,
            in_range(0.0, cfg.max_charging_rate),
        )
        .unwrap_or(defaults.charging_rate_pct_per_hour);

        let idle_drain_rate_pct_per_hour = field(
            map,
            keys::IDLE_DRAIN_RATE,
            in_range(0.0, cfg.max_idle_drain),
        )
        .unwrap_or(defaults.idle_drain_rate_pct_per_hour);

        let correction_key = if map.contains_key(keys::CORRECTION_FACTOR) {
            keys::CORRECTION_FACTOR
        } else {
            keys::LEGACY_CORRECTION_FACTOR
        };
        let learned_correction_factor = field(
            map,
            correction_key,
            in_range(cfg.min_correction, cfg.max_correction),
        )
        .unwrap_or(defaults.learned_correction_factor);

        // Charge limits are not supported; the target is always a full charge.
        if let Some(t) = map.get(keys::TARGET_SOC).and_then(Value::as_f64)
            && (t - FULL_SOC).abs() >= f64::EPSILON
        {
            tracing::warn!(target_soc = t, "ignoring persisted charge limit");
        }

        Self {
            last_actual_soc,
            last_actual_soc_time,
            is_charging,
            is_idle,
            charging_rate_pct_per_hour,
            idle_drain_rate_pct_per_hour,
            learned_correction_factor,
            target_soc: FULL_SOC,
        }
    }
}

/// Parse one persisted field. Absent and `null` are silent; a present value
/// that fails `parse` is logged and treated as absent.
fn field<T>(map: &Map<String, Value>, key: &str, parse: impl Fn(&Value) -> Option<T>) -> Option<T> {
    match map.get(key) {
        None | Some(Value::Null) => None,
        Some(v) => {
            let parsed = parse(v);
            if parsed.is_none() {
                tracing::warn!(field = key, value = %v, "discarding invalid persisted value");
            }
            parsed
        }
    }
}

fn number(x: f64) -> Value {
    serde_json::Number::from_f64(x)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn opt_number(x: Option<f64>) -> Value {
    x.map(number).unwrap_or(Value::Null)
}
