//! Type-state builder for `VehicleWorker`.
//!
//! Source, command and store are required; `build()` only exists once all
//! three are set. `try_build()` is available in any state and reports the
//! first missing piece as a `BuildError`.

use soc_traits::clock::{Clock, SystemClock};
use soc_traits::{RefreshCommand, StateStore, TelemetrySource};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::{DeepRefreshCfg, EstimatorCfg, ScheduleCfg};
use crate::driver::{VehicleDriver, VehicleWorker};
use crate::engine::SocEngine;
use crate::error::{BuildError, Result};
use crate::schedule::{RefreshSlot, Timers};

// Type-state markers for the builder
pub struct Missing;
pub struct Set;

/// Builder for `VehicleWorker`.
pub struct DriverBuilder<S, C, P> {
    source: Option<Box<dyn TelemetrySource + Send>>,
    command: Option<Box<dyn RefreshCommand + Send>>,
    store: Option<Box<dyn StateStore + Send>>,
    estimator: Option<EstimatorCfg>,
    schedule: Option<ScheduleCfg>,
    deep_refresh: Option<DeepRefreshCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    slot: Option<RefreshSlot>,
    _s: PhantomData<S>,
    _c: PhantomData<C>,
    _p: PhantomData<P>,
}

impl Default for DriverBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            source: None,
            command: None,
            store: None,
            estimator: None,
            schedule: None,
            deep_refresh: None,
            clock: None,
            slot: None,
            _s: PhantomData,
            _c: PhantomData,
            _p: PhantomData,
        }
    }
}

impl<S, C, P> DriverBuilder<S, C, P> {
    fn retype<S2, C2, P2>(self) -> DriverBuilder<S2, C2, P2> {
        DriverBuilder {
            source: self.source,
            command: self.command,
            store: self.store,
            estimator: self.estimator,
            schedule: self.schedule,
            deep_refresh: self.deep_refresh,
            clock: self.clock,
            slot: self.slot,
            _s: PhantomData,
            _c: PhantomData,
            _p: PhantomData,
        }
    }

    pub fn with_estimator(mut self, cfg: EstimatorCfg) -> Self {
        self.estimator = Some(cfg);
        self
    }

    pub fn with_schedule(mut self, cfg: ScheduleCfg) -> Self {
        self.schedule = Some(cfg);
        self
    }

    pub fn with_deep_refresh(mut self, cfg: DeepRefreshCfg) -> Self {
        self.deep_refresh = Some(cfg);
        self
    }

    /// Inject a clock (tests, replay). Defaults to the system clock.
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Override the randomly drawn deep refresh slot.
    pub fn with_slot(mut self, slot: RefreshSlot) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Fallible build available in any type-state; returns detailed
    /// BuildError for missing pieces.
    pub fn try_build(self) -> Result<VehicleWorker> {
        let source = self
            .source
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSource))?;
        let command = self
            .command
            .ok_or_else(|| eyre::Report::new(BuildError::MissingCommand))?;
        let mut store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;

        let estimator = self.estimator.unwrap_or_default();
        let schedule = self.schedule.unwrap_or_default();
        let deep_refresh = self.deep_refresh.unwrap_or_default();
        let clock: Arc<dyn Clock + Send + Sync> =
            self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));

        if schedule.tick.is_zero() || schedule.poll.is_zero() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "tick and poll periods must be > 0",
            )));
        }
        if !(estimator.correction_alpha > 0.0 && estimator.correction_alpha <= 1.0)
            || !(estimator.idle_drain_alpha > 0.0 && estimator.idle_drain_alpha <= 1.0)
        {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "EMA weights must be in (0, 1]",
            )));
        }
        if estimator.min_correction > estimator.max_correction {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "min_correction must be <= max_correction",
            )));
        }

        let engine = match store.load() {
            Ok(Some(blob)) => SocEngine::restore(estimator, &blob),
            Ok(None) => SocEngine::new(estimator),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load estimation state; starting fresh");
                SocEngine::new(estimator)
            }
        };

        let slot = self
            .slot
            .unwrap_or_else(|| RefreshSlot::pick(&deep_refresh, &mut rand::rng()));
        let timers = Timers::new(&schedule, slot, clock.now());

        Ok(VehicleWorker::from_parts(
            engine,
            source,
            command,
            store,
            deep_refresh,
            timers,
            clock,
        ))
    }
}

impl<C, P> DriverBuilder<Missing, C, P> {
    pub fn with_source(
        mut self,
        source: impl TelemetrySource + Send + 'static,
    ) -> DriverBuilder<Set, C, P> {
        self.source = Some(Box::new(source));
        self.retype()
    }
}

impl<S, P> DriverBuilder<S, Missing, P> {
    pub fn with_command(
        mut self,
        command: impl RefreshCommand + Send + 'static,
    ) -> DriverBuilder<S, Set, P> {
        self.command = Some(Box::new(command));
        self.retype()
    }
}

impl<S, C> DriverBuilder<S, C, Missing> {
    pub fn with_store(mut self, store: impl StateStore + Send + 'static) -> DriverBuilder<S, C, Set> {
        self.store = Some(Box::new(store));
        self.retype()
    }
}

impl DriverBuilder<Set, Set, Set> {
    /// Only available when source, command and store are set.
    pub fn build(self) -> Result<VehicleWorker> {
        self.try_build()
    }

    /// Build and start the worker thread.
    pub fn spawn(self) -> Result<VehicleDriver> {
        Ok(self.try_build()?.spawn())
    }
}
