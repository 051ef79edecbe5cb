use rstest::rstest;
use soc_core::error::BuildError;
use soc_core::mocks::{CountingCommand, MemoryStore, ScriptedSource};
use soc_core::{ScheduleCfg, VehicleWorker};
use std::time::Duration;

fn expect_build_error(err: &eyre::Report) -> &BuildError {
    err.downcast_ref::<BuildError>()
        .unwrap_or_else(|| panic!("expected BuildError, got: {err:?}"))
}

#[rstest]
fn builder_missing_source_yields_typed_build_error() {
    let err = VehicleWorker::builder()
        .with_command(CountingCommand::new())
        .with_store(MemoryStore::new())
        .try_build()
        .expect_err("should fail with MissingSource");
    assert_eq!(expect_build_error(&err), &BuildError::MissingSource);
}

#[rstest]
fn builder_missing_command_yields_typed_build_error() {
    let err = VehicleWorker::builder()
        .with_source(ScriptedSource::default())
        .with_store(MemoryStore::new())
        .try_build()
        .expect_err("should fail with MissingCommand");
    assert_eq!(expect_build_error(&err), &BuildError::MissingCommand);
}

#[rstest]
fn builder_missing_store_yields_typed_build_error() {
    let err = VehicleWorker::builder()
        .with_source(ScriptedSource::default())
        .with_command(CountingCommand::new())
        .try_build()
        .expect_err("should fail with MissingStore");
    assert_eq!(expect_build_error(&err), &BuildError::MissingStore);
}

#[rstest]
#[case::zero_tick(Duration::ZERO, Duration::from_secs(300))]
#[case::zero_poll(Duration::from_secs(60), Duration::ZERO)]
fn builder_rejects_zero_periods(#[case] tick: Duration, #[case] poll: Duration) {
    let err = VehicleWorker::builder()
        .with_source(ScriptedSource::default())
        .with_command(CountingCommand::new())
        .with_store(MemoryStore::new())
        .with_schedule(ScheduleCfg { tick, poll })
        .build()
        .expect_err("zero period must be rejected");
    assert!(matches!(
        expect_build_error(&err),
        BuildError::InvalidConfig(_)
    ));
}

#[rstest]
fn builder_rejects_inverted_correction_bounds() {
    let cfg = soc_core::EstimatorCfg {
        min_correction: 1.2,
        max_correction: 0.8,
        ..Default::default()
    };
    let err = VehicleWorker::builder()
        .with_source(ScriptedSource::default())
        .with_command(CountingCommand::new())
        .with_store(MemoryStore::new())
        .with_estimator(cfg)
        .build()
        .expect_err("inverted bounds must be rejected");
    assert!(matches!(
        expect_build_error(&err),
        BuildError::InvalidConfig(_)
    ));
}
