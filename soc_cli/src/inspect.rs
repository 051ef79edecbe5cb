//! `socx inspect`: validated view of a persisted state file.

use chrono::{DateTime, Utc};
use serde_json::Value;
use soc_adapters::JsonFileStore;
use soc_core::SocEngine;
use soc_core::state::keys;
use std::path::Path;

use crate::fmt_opt;

pub fn run_inspect(
    cfg: &soc_config::Config,
    state: &Path,
    at: Option<&str>,
    json: bool,
) -> eyre::Result<Option<f64>> {
    let at: DateTime<Utc> = match at {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map_err(|e| eyre::eyre!("--at must be an RFC 3339 timestamp ({s:?}): {e}"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let blob = JsonFileStore::new(state)
        .read()
        .map_err(|e| eyre::eyre!("read state file {state:?}: {e}"))?
        .ok_or_else(|| eyre::eyre!("state file {state:?} does not exist"))?;

    let engine = SocEngine::restore((&cfg.estimator).into(), &blob);
    let estimate = engine.estimate(at);
    let st = engine.state();

    if json {
        let mut out = st.to_map();
        out.insert("at".into(), Value::String(at.to_rfc3339()));
        out.insert(
            "estimate".into(),
            estimate
                .and_then(serde_json::Number::from_f64)
                .map_or(Value::Null, Value::Number),
        );
        if let Some(prev) = blob.get(keys::LAST_ESTIMATED_SOC) {
            out.insert(keys::LAST_ESTIMATED_SOC.into(), prev.clone());
        }
        println!("{}", Value::Object(out));
    } else {
        let since = st
            .last_actual_soc_time()
            .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
        println!("baseline:          {} at {since}", fmt_opt(st.last_actual_soc()));
        println!("mode:              {:?}", st.mode());
        println!(
            "charging rate:     {:.1}%/h",
            st.charging_rate_pct_per_hour()
        );
        println!(
            "idle drain:        {:.3}%/h",
            st.idle_drain_rate_pct_per_hour()
        );
        println!(
            "correction factor: {:.3}",
            st.learned_correction_factor()
        );
        println!("estimate:          {} at {}", fmt_opt(estimate), at.to_rfc3339());
    }
    Ok(estimate)
}
