//! Per-vehicle estimator: state, tuning and the most recent raw sample.

use chrono::{DateTime, Utc};
use serde_json::Value;
use soc_traits::{RawSample, StateBlob};

use crate::config::EstimatorCfg;
use crate::extrapolate::extrapolate;
use crate::ingest::{IngestOutcome, ingest};
use crate::rate::{charging_rate_with, select_time_to_full};
use crate::state::{EstimationState, keys};
use crate::util::{round1, valid_soc};

/// One vehicle's SOC estimator.
///
/// Every mutation takes `&mut self`; callers serialize ingestion by owning
/// the engine on one thread or by holding a lock around it.
#[derive(Debug, Clone)]
pub struct SocEngine {
    cfg: EstimatorCfg,
    state: EstimationState,
    latest: Option<RawSample>,
}

impl Default for SocEngine {
    fn default() -> Self {
        Self::new(EstimatorCfg::default())
    }
}

impl SocEngine {
    pub fn new(cfg: EstimatorCfg) -> Self {
        let state = EstimationState::new(&cfg);
        Self {
            cfg,
            state,
            latest: None,
        }
    }

    /// Rehydrate from a persisted blob (see `EstimationState::from_map_with`).
    pub fn restore(cfg: EstimatorCfg, blob: &StateBlob) -> Self {
        let state = EstimationState::from_map_with(blob, &cfg);
        tracing::debug!(?state, "restored estimation state");
        Self {
            cfg,
            state,
            latest: None,
        }
    }

    /// Start from an explicit state (tests, tooling).
    pub fn with_state(cfg: EstimatorCfg, state: EstimationState) -> Self {
        Self {
            cfg,
            state,
            latest: None,
        }
    }

    pub fn cfg(&self) -> &EstimatorCfg {
        &self.cfg
    }

    pub fn state(&self) -> &EstimationState {
        &self.state
    }

    pub fn latest_sample(&self) -> Option<&RawSample> {
        self.latest.as_ref()
    }

    /// Feed a new telemetry sample observed at `now`.
    pub fn ingest(&mut self, sample: RawSample, now: DateTime<Utc>) -> IngestOutcome {
        let outcome = ingest(&mut self.state, &self.cfg, &sample, now);
        self.latest = Some(sample);
        outcome
    }

    /// Current SOC estimate. Falls back to the latest raw reading while no
    /// baseline exists; `None` means unavailable.
    pub fn estimate(&self, now: DateTime<Utc>) -> Option<f64> {
        extrapolate(&self.state, &self.cfg, now)
            .or_else(|| self.latest.as_ref().and_then(|s| valid_soc(s.soc)))
    }

    /// True once any reading has been accepted.
    pub fn is_available(&self) -> bool {
        self.state.last_actual_soc().is_some()
    }

    /// Whether the estimate moves with time (worth re-publishing on ticks).
    pub fn is_extrapolating(&self) -> bool {
        (self.state.is_charging() && self.state.charging_rate_pct_per_hour() > 0.0)
            || (self.state.is_idle() && self.state.idle_drain_rate_pct_per_hour() > 0.0)
    }

    /// Charging rate derived directly from the latest raw sample, in %/h
    /// rounded to 0.1. `0.0` when not charging; `None` when the sample lacks
    /// an SOC or a usable time-to-full.
    pub fn charging_rate(&self) -> Option<f64> {
        let sample = self.latest.as_ref()?;
        if !sample.is_charging {
            return Some(0.0);
        }
        let soc = valid_soc(sample.soc)?;
        let ttf = select_time_to_full(
            sample.charging_level,
            sample.time_to_full_level2_minutes,
            sample.time_to_full_level3_minutes,
        )?;
        Some(round1(charging_rate_with(&self.cfg, soc, Some(ttf))))
    }

    /// Persistable form of the state plus the estimate at `now`.
    pub fn snapshot(&self, now: DateTime<Utc>) -> StateBlob {
        let mut blob = self.state.to_map();
        let est = self
            .estimate(now)
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        blob.insert(keys::LAST_ESTIMATED_SOC.into(), est);
        blob
    }
}
