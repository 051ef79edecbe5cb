//! `socx simulate`: a simulated vehicle charging, then parked, on a manual
//! clock.

use chrono::{TimeZone, Utc};
use serde_json::json;
use soc_adapters::{SimulatedVehicle, VehicleModel};
use soc_core::driver::lock_engine;
use soc_core::mocks::MemoryStore;
use soc_core::{Observation, VehicleWorker};
use soc_traits::{ChargingLevel, Clock, ManualClock};
use std::time::Duration;

use crate::fmt_opt;

#[derive(Debug, Clone, Copy)]
pub struct SimParams {
    pub hours: f64,
    pub step_mins: u32,
    pub start_soc: f64,
    pub charge_hours: f64,
    pub ttf_bias: f64,
    pub report_mins: u32,
}

impl SimParams {
    fn validate(&self) -> eyre::Result<()> {
        if !(self.hours.is_finite() && self.hours > 0.0) {
            eyre::bail!("--hours must be > 0");
        }
        if self.step_mins == 0 {
            eyre::bail!("--step-mins must be >= 1");
        }
        if !(0.0..=100.0).contains(&self.start_soc) {
            eyre::bail!("--start-soc must be in [0, 100]");
        }
        if !(self.charge_hours.is_finite() && self.charge_hours >= 0.0) {
            eyre::bail!("--charge-hours must be >= 0");
        }
        if !(self.ttf_bias.is_finite() && self.ttf_bias > 0.0) {
            eyre::bail!("--ttf-bias must be > 0");
        }
        if self.report_mins == 0 {
            eyre::bail!("--report-mins must be >= 1");
        }
        Ok(())
    }
}

/// Largest gap between the estimate and the simulated truth over the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimSummary {
    pub steps: usize,
    pub max_error: f64,
    pub correction_factor: f64,
    pub idle_drain_rate: f64,
}

pub fn run_simulate(
    cfg: &soc_config::Config,
    p: SimParams,
    json: bool,
) -> eyre::Result<SimSummary> {
    p.validate()?;

    // Fixed start keeps runs reproducible.
    let start = Utc
        .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
        .single()
        .ok_or_else(|| eyre::eyre!("invalid simulation start"))?;
    let clock = ManualClock::new(start);
    let vehicle = SimulatedVehicle::new(
        VehicleModel {
            soc: p.start_soc,
            ttf_bias: p.ttf_bias,
            ..VehicleModel::default()
        },
        clock.clone(),
        Duration::from_secs(u64::from(p.report_mins) * 60),
    );
    if p.charge_hours > 0.0 {
        vehicle.plug_in(ChargingLevel::Ac);
    }

    let mut worker = VehicleWorker::builder()
        .with_source(vehicle.clone())
        .with_command(vehicle.clone())
        .with_store(MemoryStore::new())
        .with_estimator((&cfg.estimator).into())
        .with_schedule((&cfg.schedule).into())
        .with_deep_refresh((&cfg.deep_refresh).into())
        .with_clock(clock.clone())
        .build()?;
    let slot = worker.slot();
    tracing::info!(hour = slot.hour, minute = slot.minute, "simulated deep refresh slot");

    let step = Duration::from_secs(u64::from(p.step_mins) * 60);
    let total_steps = (p.hours * 60.0 / f64::from(p.step_mins)).ceil() as usize;
    let mut plugged = p.charge_hours > 0.0;
    let mut max_error = 0.0f64;

    for i in 0..=total_steps {
        let now = clock.now();
        let elapsed_h = (now - start).num_seconds() as f64 / 3600.0;
        if plugged && elapsed_h >= p.charge_hours {
            vehicle.unplug();
            plugged = false;
        }

        let mut refreshed = false;
        for obs in worker.step(now) {
            if let Observation::DeepRefresh { result, .. } = obs {
                refreshed = result.is_ok();
            }
        }

        let truth = vehicle.true_soc();
        let engine = worker.engine();
        let e = lock_engine(&engine);
        let estimate = e.estimate(now);
        if let Some(est) = estimate {
            max_error = max_error.max((est - truth).abs());
        }
        let reported = e.latest_sample().and_then(|s| s.soc);
        let st = e.state();

        if json {
            println!(
                "{}",
                json!({
                    "step": i,
                    "at": now.to_rfc3339(),
                    "true_soc": (truth * 10.0).round() / 10.0,
                    "reported_soc": reported,
                    "estimate": estimate,
                    "charging": plugged,
                    "deep_refresh": refreshed,
                    "correction_factor": st.learned_correction_factor(),
                    "idle_drain_rate": st.idle_drain_rate_pct_per_hour(),
                })
            );
        } else {
            println!(
                "{}  truth={:>5.1}  reported={:>5}  est={:>5}  factor={:.3}{}",
                now.format("%m-%d %H:%M"),
                truth,
                fmt_opt(reported),
                fmt_opt(estimate),
                st.learned_correction_factor(),
                if refreshed { "  (deep refresh)" } else { "" },
            );
        }
        drop(e);
        clock.advance(step);
    }

    let engine = worker.engine();
    let e = lock_engine(&engine);
    let summary = SimSummary {
        steps: total_steps + 1,
        max_error: (max_error * 10.0).round() / 10.0,
        correction_factor: e.state().learned_correction_factor(),
        idle_drain_rate: e.state().idle_drain_rate_pct_per_hour(),
    };
    if json {
        println!(
            "{}",
            json!({
                "summary": {
                    "steps": summary.steps,
                    "max_error": summary.max_error,
                    "correction_factor": summary.correction_factor,
                    "idle_drain_rate": summary.idle_drain_rate,
                }
            })
        );
    } else {
        println!(
            "simulated {} steps: max error {:.1} points, factor {:.3}, idle drain {:.3}%/h",
            summary.steps, summary.max_error, summary.correction_factor, summary.idle_drain_rate
        );
    }
    Ok(summary)
}
