use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::{Map, Value};
use soc_core::{EstimationState, EstimatorCfg, SocEngine, calculate_charging_rate};
use soc_traits::{ChargingLevel, RawSample};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
}

#[derive(Debug, Clone)]
struct Step {
    minutes: i64,
    soc: Option<f64>,
    is_charging: bool,
    ignition_on: bool,
    ttf_l2: Option<f64>,
    ttf_l3: Option<f64>,
}

fn step() -> impl Strategy<Value = Step> {
    (
        0i64..600,
        proptest::option::of(-10.0f64..110.0),
        any::<bool>(),
        any::<bool>(),
        proptest::option::of(-5.0f64..600.0),
        proptest::option::of(-5.0f64..600.0),
    )
        .prop_map(|(minutes, soc, is_charging, ignition_on, ttf_l2, ttf_l3)| Step {
            minutes,
            soc,
            is_charging,
            ignition_on,
            ttf_l2,
            ttf_l3,
        })
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1e6f64..1e6).prop_map(|x| serde_json::json!(x)),
        "[a-z0-9:-]{0,24}".prop_map(Value::String),
    ]
}

const KEYS: [&str; 9] = [
    "last_actual_soc",
    "last_actual_soc_time",
    "is_charging",
    "is_idle",
    "charging_rate_pct_per_hour",
    "idle_drain_rate_pct_per_hour",
    "learned_correction_factor",
    "learned_efficiency",
    "target_soc",
];

fn assert_in_bounds(s: &EstimationState, cfg: &EstimatorCfg) {
    let r = s.charging_rate_pct_per_hour();
    assert!((0.0..=cfg.max_charging_rate).contains(&r), "rate {r}");
    let d = s.idle_drain_rate_pct_per_hour();
    assert!((0.0..=cfg.max_idle_drain).contains(&d), "drain {d}");
    let f = s.learned_correction_factor();
    assert!(
        (cfg.min_correction..=cfg.max_correction).contains(&f),
        "factor {f}"
    );
    assert!(!(s.is_charging() && s.is_idle()));
    assert_eq!(s.target_soc(), 100.0);
    if let Some(soc) = s.last_actual_soc() {
        assert!((0.0..=100.0).contains(&soc));
    }
}

proptest! {
    #[test]
    fn charging_rate_is_bounded(soc in -50.0f64..150.0, ttf in proptest::option::of(-100.0f64..10_000.0)) {
        let r = calculate_charging_rate(soc, ttf);
        prop_assert!((0.0..=300.0).contains(&r));
    }

    #[test]
    fn learned_coefficients_stay_in_bounds(steps in proptest::collection::vec(step(), 1..40)) {
        let cfg = EstimatorCfg::default();
        let mut e = SocEngine::new(cfg.clone());
        let mut now = t0();
        for s in steps {
            now += Duration::minutes(s.minutes);
            let sample = RawSample {
                soc: s.soc,
                is_charging: s.is_charging,
                ignition_on: s.ignition_on,
                charging_level: Some(ChargingLevel::Unknown),
                time_to_full_level2_minutes: s.ttf_l2,
                time_to_full_level3_minutes: s.ttf_l3,
                timestamp: now,
            };
            e.ingest(sample, now);
            assert_in_bounds(e.state(), &cfg);

            if let Some(est) = e.estimate(now + Duration::minutes(45)) {
                prop_assert!((0.0..=100.0).contains(&est), "estimate {est}");
            }
        }
    }

    #[test]
    fn idle_estimate_never_rises(base in 0.0f64..=100.0, drain in 0.0f64..0.5, hours in 0i64..2_000) {
        let cfg = EstimatorCfg::default();
        let mut s = EstimationState::new(&cfg);
        s.set_baseline(base, t0());
        s.set_mode(soc_core::Mode::Idle);
        s.set_idle_drain_rate(drain, &cfg);
        let e = SocEngine::with_state(cfg, s);
        let est = e.estimate(t0() + Duration::hours(hours)).unwrap();
        prop_assert!(est >= 0.0);
        prop_assert!(est <= (base * 10.0).round() / 10.0);
    }

    #[test]
    fn any_blob_restores_in_bounds(entries in proptest::collection::vec((0usize..KEYS.len(), arb_value()), 0..12)) {
        let cfg = EstimatorCfg::default();
        let mut m = Map::new();
        for (k, v) in entries {
            m.insert(KEYS[k].to_string(), v);
        }
        let s = EstimationState::from_map_with(&m, &cfg);
        assert_in_bounds(&s, &cfg);
        prop_assert_eq!(s.last_actual_soc().is_some(), s.last_actual_soc_time().is_some());
    }
}
