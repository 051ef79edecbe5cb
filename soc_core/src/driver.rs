//! Per-vehicle scheduling: telemetry polls, estimate ticks, daily deep refresh
//! and persistence.
//!
//! `VehicleWorker` does the work for one instant (`step(now)`) and can be
//! driven directly by a simulation. `VehicleDriver` runs a worker on its own
//! thread, pacing it with the wall clock.
//!
//! Safety: each `VehicleDriver` spawns exactly one thread that is shut down
//! and joined when the driver is dropped. After shutdown the worker performs
//! no further state mutation.

use chrono::{DateTime, Utc};
use crossbeam_channel as xch;
use soc_traits::clock::Clock;
use soc_traits::{RefreshCommand, StateStore, TelemetrySource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::builder::{DriverBuilder, Missing};
use crate::config::DeepRefreshCfg;
use crate::engine::SocEngine;
use crate::error::EngineError;
use crate::ingest::IngestOutcome;
use crate::schedule::{RefreshSlot, Timers, should_deep_refresh};

/// Events published by the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Periodic re-evaluation of the extrapolated value.
    Estimate {
        at: DateTime<Utc>,
        soc: Option<f64>,
        charging_rate: Option<f64>,
    },
    /// A telemetry snapshot was ingested.
    Sample {
        at: DateTime<Utc>,
        outcome: IngestOutcome,
        estimate: Option<f64>,
    },
    /// The deep refresh command was issued.
    DeepRefresh {
        at: DateTime<Utc>,
        result: std::result::Result<(), EngineError>,
    },
    /// A poll or a save failed; the estimator state is unaffected.
    Fault { at: DateTime<Utc>, error: EngineError },
}

#[derive(Debug)]
struct Flags {
    shutdown: AtomicBool,
    ticks: AtomicBool,
    deep_refresh: AtomicBool,
}

/// Cancellation handle for a worker's timers. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TimerControl {
    flags: Arc<Flags>,
    wake: Option<xch::Sender<()>>,
}

impl TimerControl {
    fn new() -> Self {
        Self {
            flags: Arc::new(Flags {
                shutdown: AtomicBool::new(false),
                ticks: AtomicBool::new(true),
                deep_refresh: AtomicBool::new(true),
            }),
            wake: None,
        }
    }

    /// Stop publishing periodic estimates.
    pub fn cancel_ticks(&self) {
        self.flags.ticks.store(false, Ordering::Relaxed);
    }

    /// Stop the daily deep refresh.
    pub fn cancel_deep_refresh(&self) {
        self.flags.deep_refresh.store(false, Ordering::Relaxed);
    }

    /// Cancel everything; the worker stops mutating state immediately.
    pub fn shutdown(&self) {
        self.flags.shutdown.store(true, Ordering::Relaxed);
        self.cancel_ticks();
        self.cancel_deep_refresh();
        if let Some(w) = &self.wake {
            let _ = w.try_send(());
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.flags.shutdown.load(Ordering::Relaxed)
    }

    fn ticks_enabled(&self) -> bool {
        self.flags.ticks.load(Ordering::Relaxed)
    }

    fn deep_refresh_enabled(&self) -> bool {
        self.flags.deep_refresh.load(Ordering::Relaxed)
    }
}

/// Lock the engine, recovering from a poisoned mutex (the state is always
/// left consistent between statements, so the data is still usable).
pub fn lock_engine(engine: &Mutex<SocEngine>) -> MutexGuard<'_, SocEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns one vehicle's collaborators and timers.
pub struct VehicleWorker {
    engine: Arc<Mutex<SocEngine>>,
    source: Box<dyn TelemetrySource + Send>,
    command: Box<dyn RefreshCommand + Send>,
    store: Box<dyn StateStore + Send>,
    deep_refresh: DeepRefreshCfg,
    timers: Timers,
    control: TimerControl,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl core::fmt::Debug for VehicleWorker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VehicleWorker")
            .field("timers", &self.timers)
            .field("deep_refresh", &self.deep_refresh)
            .field("control", &self.control)
            .finish_non_exhaustive()
    }
}

impl VehicleWorker {
    pub fn builder() -> DriverBuilder<Missing, Missing, Missing> {
        DriverBuilder::default()
    }

    pub(crate) fn from_parts(
        engine: SocEngine,
        source: Box<dyn TelemetrySource + Send>,
        command: Box<dyn RefreshCommand + Send>,
        store: Box<dyn StateStore + Send>,
        deep_refresh: DeepRefreshCfg,
        timers: Timers,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            source,
            command,
            store,
            deep_refresh,
            timers,
            control: TimerControl::new(),
            clock,
        }
    }

    /// Shared handle to the engine for read-only observers.
    pub fn engine(&self) -> Arc<Mutex<SocEngine>> {
        Arc::clone(&self.engine)
    }

    pub fn control(&self) -> TimerControl {
        self.control.clone()
    }

    pub fn slot(&self) -> RefreshSlot {
        self.timers.slot()
    }

    /// Real time until the next timer fires.
    pub fn wait_from(&self, now: DateTime<Utc>) -> Duration {
        self.timers.wait_from(now)
    }

    /// Run every timer that is due at `now`.
    pub fn step(&mut self, now: DateTime<Utc>) -> Vec<Observation> {
        let mut out = Vec::new();
        if self.control.is_shut_down() {
            return out;
        }
        let due = self.timers.fire(now);
        if due.poll {
            out.extend(self.poll(now));
        }
        if due.tick
            && self.control.ticks_enabled()
            && let Some(o) = self.tick(now)
        {
            out.push(o);
        }
        if due.deep_refresh
            && self.control.deep_refresh_enabled()
            && let Some(o) = self.daily_deep_refresh(now)
        {
            out.push(o);
        }
        out
    }

    /// Pull a snapshot and ingest it. A failed poll leaves state untouched.
    ///
    /// Yields the `Sample`, followed by a `Fault` if persisting it failed, or
    /// a single `Fault` if the snapshot could not be fetched.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Vec<Observation> {
        let sample = match self.source.snapshot() {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "telemetry poll failed");
                return vec![Observation::Fault {
                    at: now,
                    error: EngineError::Telemetry(e.to_string()),
                }];
            }
        };

        let (outcome, estimate, snapshot) = {
            let mut engine = lock_engine(&self.engine);
            // Checked under the lock so a concurrent shutdown wins.
            if self.control.is_shut_down() {
                return Vec::new();
            }
            let outcome = engine.ingest(sample, now);
            let snapshot = match outcome {
                IngestOutcome::NoReading | IngestOutcome::Stale { .. } => None,
                _ => Some(engine.snapshot(now)),
            };
            (outcome, engine.estimate(now), snapshot)
        };
        tracing::debug!(outcome = outcome.name(), ?estimate, "ingested telemetry");

        let mut out = vec![Observation::Sample {
            at: now,
            outcome,
            estimate,
        }];
        if let Some(blob) = snapshot
            && let Err(e) = self.store.save(&blob)
        {
            tracing::warn!(error = %e, "failed to persist estimation state");
            out.push(Observation::Fault {
                at: now,
                error: EngineError::Persistence(e.to_string()),
            });
        }
        out
    }

    /// Re-evaluate the estimate; published only while it moves with time.
    pub fn tick(&self, now: DateTime<Utc>) -> Option<Observation> {
        let engine = lock_engine(&self.engine);
        if !engine.is_extrapolating() {
            return None;
        }
        Some(Observation::Estimate {
            at: now,
            soc: engine.estimate(now),
            charging_rate: engine.charging_rate(),
        })
    }

    /// Wake the vehicle if nothing fresh arrived for a day. Failures are
    /// logged and otherwise ignored; the next window retries.
    pub fn daily_deep_refresh(&mut self, now: DateTime<Utc>) -> Option<Observation> {
        if !self.deep_refresh.enabled {
            return None;
        }
        let due = should_deep_refresh(
            lock_engine(&self.engine).state(),
            now,
            self.deep_refresh.min_hours_since_update,
        );
        if !due {
            tracing::debug!("skipping daily deep refresh: recent update");
            return None;
        }

        tracing::info!("triggering daily deep refresh");
        let result = self.command.deep_refresh().map_err(|e| {
            tracing::warn!(error = %e, "daily deep refresh failed");
            EngineError::Command(e.to_string())
        });
        Some(Observation::DeepRefresh { at: now, result })
    }

    /// Move the worker onto its own thread.
    pub fn spawn(self) -> VehicleDriver {
        VehicleDriver::spawn(self)
    }
}

/// Handle to a worker running on a background thread.
pub struct VehicleDriver {
    engine: Arc<Mutex<SocEngine>>,
    control: TimerControl,
    rx: xch::Receiver<Observation>,
    clock: Arc<dyn Clock + Send + Sync>,
    slot: RefreshSlot,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

/// Observations buffered for slow consumers; newer ones are dropped when full.
const OBSERVATION_BACKLOG: usize = 256;

impl VehicleDriver {
    pub fn spawn(mut worker: VehicleWorker) -> Self {
        let (tx, rx) = xch::bounded(OBSERVATION_BACKLOG);
        let (wake_tx, wake_rx) = xch::bounded::<()>(1);
        worker.control.wake = Some(wake_tx);
        let control = worker.control.clone();
        let engine = worker.engine();
        let clock = Arc::clone(&worker.clock);
        let slot = worker.slot();

        tracing::info!(
            hour = slot.hour,
            minute = slot.minute,
            "scheduled daily deep refresh (UTC)"
        );

        let join_handle = std::thread::spawn(move || {
            loop {
                if worker.control.is_shut_down() {
                    tracing::debug!("vehicle worker received shutdown signal");
                    break;
                }
                let now = worker.clock.now();
                for obs in worker.step(now) {
                    if tx.try_send(obs).is_err() {
                        tracing::trace!("observation dropped (backlog full or no consumer)");
                    }
                }
                let wait = worker.wait_from(worker.clock.now());
                match wake_rx.recv_timeout(wait) {
                    Ok(()) | Err(xch::RecvTimeoutError::Timeout) => {}
                    Err(xch::RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::trace!("vehicle worker exiting cleanly");
        });

        Self {
            engine,
            control,
            rx,
            clock,
            slot,
            join_handle: Some(join_handle),
        }
    }

    /// Current estimate, computed on demand.
    pub fn estimate(&self) -> Option<f64> {
        lock_engine(&self.engine).estimate(self.clock.now())
    }

    pub fn charging_rate(&self) -> Option<f64> {
        lock_engine(&self.engine).charging_rate()
    }

    /// Serialized state for an external persister.
    pub fn snapshot(&self) -> soc_traits::StateBlob {
        lock_engine(&self.engine).snapshot(self.clock.now())
    }

    pub fn engine(&self) -> Arc<Mutex<SocEngine>> {
        Arc::clone(&self.engine)
    }

    pub fn control(&self) -> TimerControl {
        self.control.clone()
    }

    pub fn slot(&self) -> RefreshSlot {
        self.slot
    }

    pub fn observations(&self) -> &xch::Receiver<Observation> {
        &self.rx
    }

    /// Most recent buffered observation, discarding older ones.
    pub fn latest(&self) -> Option<Observation> {
        self.rx.try_iter().last()
    }

    /// Cancel all timers and join the worker thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.control.shutdown();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("vehicle worker joined"),
                Err(e) => tracing::warn!(?e, "vehicle worker panicked during shutdown"),
            }
        }
    }
}

impl Drop for VehicleDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
