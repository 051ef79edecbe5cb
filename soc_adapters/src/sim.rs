//! Simulated vehicle behind a caching telemetry API.
//!
//! The true SOC evolves continuously with the simulation clock. Polls return
//! the API's cached snapshot, which the vehicle only refreshes every
//! `report_every` (or on a deep refresh), so most polls are stale the way a
//! real account API is. The vehicle's own time-to-full estimate is skewed by
//! `ttf_bias`, which the engine's correction factor should learn away.

use chrono::{DateTime, Utc};
use soc_traits::clock::{Clock, hours_between};
use soc_traits::{ChargingLevel, RawSample, RefreshCommand, TelemetrySource};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::AdapterError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Physical parameters of the simulated vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleModel {
    pub soc: f64,
    pub plugged_in: bool,
    pub ignition_on: bool,
    pub level: ChargingLevel,
    /// True charging speed (%/h).
    pub charge_rate: f64,
    /// Reported time-to-full divided by the true one; above 1 is pessimistic.
    pub ttf_bias: f64,
    /// Parked drain (%/h).
    pub idle_drain: f64,
    /// Drain while the ignition is on (%/h).
    pub drive_drain: f64,
}

impl Default for VehicleModel {
    fn default() -> Self {
        Self {
            soc: 50.0,
            plugged_in: false,
            ignition_on: false,
            level: ChargingLevel::Ac,
            charge_rate: 20.0,
            ttf_bias: 1.0,
            idle_drain: 0.05,
            drive_drain: 15.0,
        }
    }
}

#[derive(Debug)]
struct Inner {
    model: VehicleModel,
    last_sync: DateTime<Utc>,
    cached: Option<RawSample>,
    last_report: Option<DateTime<Utc>>,
    report_every: chrono::Duration,
    reachable: bool,
}

impl Inner {
    /// Advance the physical model to `now`.
    fn sync(&mut self, now: DateTime<Utc>) {
        let dt = hours_between(self.last_sync, now);
        if dt <= 0.0 {
            return;
        }
        let m = &mut self.model;
        let delta = if m.plugged_in {
            m.charge_rate * dt
        } else if m.ignition_on {
            -m.drive_drain * dt
        } else {
            -m.idle_drain * dt
        };
        m.soc = (m.soc + delta).clamp(0.0, 100.0);
        self.last_sync = now;
    }

    fn report(&mut self, now: DateTime<Utc>) {
        let m = &self.model;
        let ttf = (m.plugged_in && m.soc < 100.0 && m.charge_rate > 0.0)
            .then(|| (100.0 - m.soc) / m.charge_rate * 60.0 * m.ttf_bias);
        let (l2, l3) = match m.level {
            ChargingLevel::DcFast => (None, ttf),
            _ => (ttf, None),
        };
        self.cached = Some(RawSample {
            soc: Some((m.soc * 10.0).round() / 10.0),
            is_charging: m.plugged_in && m.soc < 100.0,
            ignition_on: m.ignition_on,
            charging_level: m.plugged_in.then_some(m.level),
            time_to_full_level2_minutes: l2,
            time_to_full_level3_minutes: l3,
            timestamp: now,
        });
        self.last_report = Some(now);
    }
}

/// Telemetry source and command target for one simulated vehicle.
/// Clones share the same vehicle.
#[derive(Clone)]
pub struct SimulatedVehicle {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl core::fmt::Debug for SimulatedVehicle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatedVehicle")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl SimulatedVehicle {
    pub fn new(
        model: VehicleModel,
        clock: impl Clock + Send + Sync + 'static,
        report_every: std::time::Duration,
    ) -> Self {
        let now = clock.now();
        let report_every =
            chrono::Duration::from_std(report_every).unwrap_or(chrono::Duration::MAX);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                model,
                last_sync: now,
                cached: None,
                last_report: None,
                report_every,
                reachable: true,
            })),
            clock: Arc::new(clock),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a change to the physical model at the current clock time.
    fn update(&self, f: impl FnOnce(&mut VehicleModel)) {
        let now = self.clock.now();
        let mut g = self.lock();
        g.sync(now);
        f(&mut g.model);
    }

    pub fn plug_in(&self, level: ChargingLevel) {
        self.update(|m| {
            m.plugged_in = true;
            m.ignition_on = false;
            m.level = level;
        });
    }

    pub fn unplug(&self) {
        self.update(|m| m.plugged_in = false);
    }

    pub fn set_ignition(&self, on: bool) {
        self.update(|m| m.ignition_on = on);
    }

    /// An unreachable vehicle fails polls and commands.
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Ground truth at the current clock time.
    pub fn true_soc(&self) -> f64 {
        let now = self.clock.now();
        let mut g = self.lock();
        g.sync(now);
        g.model.soc
    }

    pub fn model(&self) -> VehicleModel {
        self.lock().model.clone()
    }
}

impl TelemetrySource for SimulatedVehicle {
    fn snapshot(&mut self) -> Result<RawSample, BoxError> {
        let now = self.clock.now();
        let mut g = self.lock();
        if !g.reachable {
            return Err(AdapterError::Unreachable.into());
        }
        g.sync(now);
        let due = g
            .last_report
            .is_none_or(|at| now.signed_duration_since(at) >= g.report_every);
        if due {
            g.report(now);
        }
        g.cached.clone().ok_or_else(|| AdapterError::Unreachable.into())
    }
}

impl RefreshCommand for SimulatedVehicle {
    fn deep_refresh(&mut self) -> Result<(), BoxError> {
        let now = self.clock.now();
        let mut g = self.lock();
        if !g.reachable {
            return Err(AdapterError::Unreachable.into());
        }
        g.sync(now);
        g.report(now);
        tracing::debug!(soc = g.model.soc, "simulated vehicle woke up and reported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use soc_traits::ManualClock;
    use std::time::Duration;

    fn setup() -> (ManualClock, SimulatedVehicle) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        let v = SimulatedVehicle::new(
            VehicleModel {
                soc: 40.0,
                ttf_bias: 1.25,
                ..VehicleModel::default()
            },
            clock.clone(),
            Duration::from_secs(3600),
        );
        (clock, v)
    }

    #[test]
    fn charges_and_reports_biased_time_to_full() {
        let (clock, mut v) = setup();
        v.plug_in(ChargingLevel::Ac);
        clock.advance(Duration::from_secs(3600));
        assert!((v.true_soc() - 60.0).abs() < 1e-9);

        let s = v.snapshot().unwrap();
        assert_eq!(s.soc, Some(60.0));
        assert!(s.is_charging);
        // 40 points at 20 %/h is 120 min, reported 25% long
        assert!((s.time_to_full_level2_minutes.unwrap() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn polls_between_reports_are_cached() {
        let (clock, mut v) = setup();
        let first = v.snapshot().unwrap();
        clock.advance(Duration::from_secs(30 * 60));
        v.set_ignition(true);
        clock.advance(Duration::from_secs(10 * 60));
        let cached = v.snapshot().unwrap();
        assert_eq!(cached.soc, first.soc);
        assert!(!cached.ignition_on);

        v.deep_refresh().unwrap();
        let fresh = v.snapshot().unwrap();
        assert!(fresh.ignition_on);
        assert!(fresh.soc < first.soc);
    }

    #[test]
    fn unreachable_vehicle_fails() {
        let (_clock, mut v) = setup();
        v.set_reachable(false);
        assert!(v.snapshot().is_err());
        assert!(v.deep_refresh().is_err());
    }
}
