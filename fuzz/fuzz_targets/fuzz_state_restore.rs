#![no_main]
use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use soc_core::{EstimatorCfg, SocEngine};

fuzz_target!(|data: &[u8]| {
    let Ok(serde_json::Value::Object(blob)) = serde_json::from_slice(data) else {
        return;
    };
    let cfg = EstimatorCfg::default();
    let engine = SocEngine::restore(cfg.clone(), &blob);
    let s = engine.state();
    assert!(s.learned_correction_factor() >= cfg.min_correction);
    assert!(s.learned_correction_factor() <= cfg.max_correction);
    assert!(!(s.is_charging() && s.is_idle()));

    let at = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
    if let Some(est) = engine.estimate(at) {
        assert!((0.0..=100.0).contains(&est));
    }
    // restored state must survive its own round trip
    let again = soc_core::EstimationState::from_map(&s.to_map());
    assert_eq!(&again, s);
});
