#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = soc_config::load_toml(data) {
        if cfg.validate().is_ok() {
            let _ = soc_core::EstimatorCfg::from(&cfg.estimator);
            let _ = soc_core::ScheduleCfg::from(&cfg.schedule);
        }
    }
});
