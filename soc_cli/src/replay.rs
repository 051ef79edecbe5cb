//! `socx replay`: recorded telemetry through the worker at its own timestamps.

use chrono::{DateTime, Utc};
use eyre::WrapErr;
use serde_json::json;
use soc_adapters::{JsonFileStore, ReplayVehicle};
use soc_core::driver::lock_engine;
use soc_core::mocks::MemoryStore;
use soc_core::{IngestOutcome, Observation, VehicleWorker};
use soc_traits::{ManualClock, StateStore};
use std::path::Path;

use crate::fmt_opt;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub samples: usize,
    pub accepted: usize,
    pub stale: usize,
    pub ignored: usize,
}

pub fn run_replay(
    cfg: &soc_config::Config,
    samples: &Path,
    state: Option<&Path>,
    json: bool,
) -> eyre::Result<ReplaySummary> {
    let rows = soc_config::load_telemetry_csv(samples)?;
    let Some(first) = rows.first() else {
        eyre::bail!("telemetry CSV {samples:?} has no rows");
    };
    let clock = ManualClock::new(first.timestamp);

    let store: Box<dyn StateStore + Send> = match state {
        Some(p) => Box::new(JsonFileStore::new(p)),
        None => Box::new(MemoryStore::new()),
    };

    let mut worker = VehicleWorker::builder()
        .with_source(ReplayVehicle::from_rows(&rows))
        .with_command(ReplayVehicle::default())
        .with_store(store)
        .with_estimator((&cfg.estimator).into())
        .with_schedule((&cfg.schedule).into())
        .with_deep_refresh((&cfg.deep_refresh).into())
        .with_clock(clock.clone())
        .build()?;

    let mut summary = ReplaySummary::default();
    let mut last: DateTime<Utc> = first.timestamp;
    for row in &rows {
        clock.set(row.timestamp);
        last = row.timestamp;
        let mut sample = None;
        for obs in worker.poll(row.timestamp) {
            match obs {
                Observation::Sample {
                    outcome, estimate, ..
                } => sample = Some((outcome, estimate)),
                Observation::Fault { error, .. } => {
                    tracing::warn!(%error, at = %row.timestamp, "replay step failed");
                }
                _ => {}
            }
        }
        let Some((outcome, estimate)) = sample else {
            continue;
        };
        summary.samples += 1;
        match outcome {
            IngestOutcome::Accepted { .. } => summary.accepted += 1,
            IngestOutcome::Stale { .. } => summary.stale += 1,
            _ => summary.ignored += 1,
        }

        let engine = worker.engine();
        let e = lock_engine(&engine);
        let st = e.state();
        if json {
            println!(
                "{}",
                json!({
                    "timestamp": row.timestamp.to_rfc3339(),
                    "soc": row.soc,
                    "result": outcome,
                    "estimate": estimate,
                    "charging_rate": e.charging_rate(),
                    "correction_factor": st.learned_correction_factor(),
                    "idle_drain_rate": st.idle_drain_rate_pct_per_hour(),
                })
            );
        } else {
            println!(
                "{}  {:<17} soc={:>5}  est={:>5}  factor={:.3}  drain={:.3}%/h",
                row.timestamp.format("%Y-%m-%d %H:%M"),
                outcome.name(),
                fmt_opt(row.soc),
                fmt_opt(estimate),
                st.learned_correction_factor(),
                st.idle_drain_rate_pct_per_hour(),
            );
        }
    }

    if let Some(p) = state {
        let snapshot = lock_engine(&worker.engine()).snapshot(last);
        JsonFileStore::new(p)
            .write(&snapshot)
            .wrap_err_with(|| format!("write state file {p:?}"))?;
    }

    if json {
        println!(
            "{}",
            json!({
                "summary": {
                    "samples": summary.samples,
                    "accepted": summary.accepted,
                    "stale": summary.stale,
                    "ignored": summary.ignored,
                }
            })
        );
    } else {
        println!(
            "replayed {} samples: {} accepted, {} stale, {} ignored",
            summary.samples, summary.accepted, summary.stale, summary.ignored
        );
    }
    Ok(summary)
}
