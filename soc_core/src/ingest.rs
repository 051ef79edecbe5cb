//! Acceptance policy for incoming telemetry.
//!
//! The remote API regularly serves cached snapshots long after the vehicle
//! has moved on. Accepting one of those as a new baseline would both yank the
//! estimate backwards and feed the learner a bogus interval, so every sample
//! is judged against the estimate the engine had *before* it arrived.

use chrono::{DateTime, Utc};
use serde::Serialize;
use soc_traits::RawSample;

use crate::config::EstimatorCfg;
use crate::extrapolate::extrapolate;
use crate::learner::{learn_correction_factor, learn_idle_drain_rate};
use crate::rate::{charging_rate_with, select_time_to_full};
use crate::state::{EstimationState, Mode};
use crate::util::valid_soc;

/// Why a sample was judged stale. Stale samples change nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StaleReason {
    /// Still charging, yet below the last accepted reading.
    BelowBaseline { baseline: f64 },
    /// Still charging, yet below where the charge curve already is.
    BelowEstimate { estimate: f64 },
}

/// Coefficient updates triggered by an accepted sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Learned {
    pub correction_factor: Option<f64>,
    pub idle_drain_rate: Option<f64>,
}

/// Result of ingesting one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// No usable SOC reading; state left untouched.
    NoReading,
    /// New baseline recorded.
    Accepted { soc: f64, learned: Learned },
    /// Same SOC as the baseline; mode and rate refreshed.
    Unchanged { soc: f64 },
    /// Idle vehicle reporting more charge than the drain model allows; the
    /// baseline is kept, mode and rate refreshed.
    IdleGainIgnored { soc: f64, estimate: f64 },
    /// Cached reading; baseline, mode and rate all frozen.
    Stale { soc: f64, reason: StaleReason },
}

impl IngestOutcome {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Short stable name for logs and CLI output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoReading => "no_reading",
            Self::Accepted { .. } => "accepted",
            Self::Unchanged { .. } => "unchanged",
            Self::IdleGainIgnored { .. } => "idle_gain_ignored",
            Self::Stale { .. } => "stale",
        }
    }
}

/// Apply one raw sample to `state`.
pub fn ingest(
    state: &mut EstimationState,
    cfg: &EstimatorCfg,
    sample: &RawSample,
    now: DateTime<Utc>,
) -> IngestOutcome {
    let Some(soc) = valid_soc(sample.soc) else {
        if let Some(raw) = sample.soc {
            tracing::debug!(soc = raw, "ignoring impossible SOC reading");
        }
        return IngestOutcome::NoReading;
    };

    let prev_mode = state.mode();
    let new_mode = Mode::from_flags(sample.is_charging, sample.ignition_on);
    let baseline = state.last_actual_soc();
    let soc_changed = baseline.is_none_or(|b| soc != b);
    // Judged against the state as it was before this sample.
    let estimate = extrapolate(state, cfg, now);

    if prev_mode == Mode::Charging && new_mode == Mode::Charging {
        if let Some(b) = baseline
            && soc < b
        {
            tracing::debug!(soc, baseline = b, "stale sample: SOC dropped while charging");
            return IngestOutcome::Stale {
                soc,
                reason: StaleReason::BelowBaseline { baseline: b },
            };
        }
        if let Some(e) = estimate
            && soc < e
        {
            tracing::debug!(soc, estimate = e, "stale sample: behind the charge curve");
            return IngestOutcome::Stale {
                soc,
                reason: StaleReason::BelowEstimate { estimate: e },
            };
        }
    }

    let idle_gain = match estimate {
        Some(e) if prev_mode == Mode::Idle && new_mode == Mode::Idle && soc_changed && soc > e => {
            Some(e)
        }
        _ => None,
    };

    let outcome = if let Some(e) = idle_gain {
        tracing::debug!(soc, estimate = e, "keeping baseline: idle vehicle cannot gain charge");
        IngestOutcome::IdleGainIgnored { soc, estimate: e }
    } else if soc_changed {
        let learned = Learned {
            correction_factor: learn_correction_factor(
                state,
                cfg,
                soc,
                now,
                prev_mode == Mode::Charging,
            ),
            idle_drain_rate: learn_idle_drain_rate(state, cfg, soc, now, prev_mode == Mode::Idle),
        };
        state.set_baseline(soc, now);
        tracing::debug!(soc, ?prev_mode, ?new_mode, "accepted new baseline");
        IngestOutcome::Accepted { soc, learned }
    } else {
        IngestOutcome::Unchanged { soc }
    };

    state.set_mode(new_mode);

    let rate = if sample.is_charging {
        let ttf = select_time_to_full(
            sample.charging_level,
            sample.time_to_full_level2_minutes,
            sample.time_to_full_level3_minutes,
        );
        charging_rate_with(cfg, soc, ttf)
    } else {
        0.0
    };
    state.set_charging_rate(rate, cfg);

    outcome
}
