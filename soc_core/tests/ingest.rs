//! Acceptance policy scenarios driven through `SocEngine`.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rstest::rstest;
use soc_core::{IngestOutcome, Mode, SocEngine, StaleReason};
use soc_traits::{ChargingLevel, RawSample};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()
}

fn charging(at: DateTime<Utc>, soc: f64, ttf_l2: f64) -> RawSample {
    RawSample {
        soc: Some(soc),
        is_charging: true,
        ignition_on: false,
        charging_level: Some(ChargingLevel::Ac),
        time_to_full_level2_minutes: Some(ttf_l2),
        time_to_full_level3_minutes: None,
        timestamp: at,
    }
}

fn parked(at: DateTime<Utc>, soc: f64) -> RawSample {
    RawSample {
        soc: Some(soc),
        ..RawSample::empty(at)
    }
}

fn driving(at: DateTime<Utc>, soc: f64) -> RawSample {
    RawSample {
        soc: Some(soc),
        ignition_on: true,
        ..RawSample::empty(at)
    }
}

/// Engine charging from 50% at 20 %/h since t0.
fn charging_engine() -> SocEngine {
    let mut e = SocEngine::default();
    let out = e.ingest(charging(t0(), 50.0, 150.0), t0());
    assert!(out.is_accepted());
    e
}

/// Engine parked at 80% since t0 with the default drain.
fn parked_engine() -> SocEngine {
    let mut e = SocEngine::default();
    e.ingest(parked(t0(), 80.0), t0());
    e
}

#[test]
fn first_charging_sample_sets_baseline_and_rate() {
    let e = charging_engine();
    assert_eq!(e.state().baseline(), Some((50.0, t0())));
    assert_eq!(e.state().mode(), Mode::Charging);
    assert!((e.state().charging_rate_pct_per_hour() - 20.0).abs() < 1e-9);
    assert_eq!(e.estimate(t0() + Duration::hours(1)), Some(70.0));
    assert_eq!(e.charging_rate(), Some(20.0));
}

#[test]
fn cached_lower_reading_while_charging_is_rejected() {
    let mut e = charging_engine();
    let before = e.state().clone();
    let at = t0() + Duration::minutes(30);

    let out = e.ingest(charging(at, 45.0, 165.0), at);

    assert_eq!(
        out,
        IngestOutcome::Stale {
            soc: 45.0,
            reason: StaleReason::BelowBaseline { baseline: 50.0 }
        }
    );
    assert_eq!(e.state(), &before);
    assert_eq!(e.estimate(at), Some(60.0));
}

#[test]
fn cached_reading_ten_minutes_later_keeps_the_baseline() {
    let mut e = charging_engine();
    let at = t0() + Duration::minutes(10);

    let out = e.ingest(charging(at, 45.0, 165.0), at);

    assert!(out.is_stale());
    assert_eq!(e.state().baseline(), Some((50.0, t0())));
    assert_eq!(e.state().mode(), Mode::Charging);
}

#[rstest]
#[case::charging_one_hour(charging(t0(), 60.0, 120.0), Duration::hours(1), 80.0)]
#[case::parked_one_day(parked(t0(), 80.0), Duration::hours(24), 79.0)]
fn estimate_projects_from_the_baseline(
    #[case] first: RawSample,
    #[case] after: Duration,
    #[case] expected: f64,
) {
    let mut e = SocEngine::default();
    assert!(e.ingest(first, t0()).is_accepted());
    assert_eq!(e.estimate(t0() + after), Some(expected));
}

/// A lower reading that arrives together with a plug/unplug is a real
/// transition, not a cached value.
#[rstest]
#[case::unplugged(true, parked(t0() + Duration::minutes(30), 45.0), Mode::Idle)]
#[case::plugged_in(false, charging(t0() + Duration::minutes(30), 75.0, 150.0), Mode::Charging)]
fn lower_reading_on_mode_change_is_accepted(
    #[case] start_charging: bool,
    #[case] sample: RawSample,
    #[case] mode: Mode,
) {
    let mut e = if start_charging {
        charging_engine()
    } else {
        parked_engine()
    };
    let at = sample.timestamp;
    let soc = sample.soc.unwrap();

    let out = e.ingest(sample, at);

    let IngestOutcome::Accepted { learned, .. } = out else {
        panic!("expected acceptance, got {out:?}");
    };
    // a negative charging delta teaches nothing, and half an hour parked is too short
    assert_eq!(learned.correction_factor, None);
    assert_eq!(learned.idle_drain_rate, None);
    assert_eq!(e.state().learned_correction_factor(), 1.0);
    assert_eq!(e.state().baseline(), Some((soc, at)));
    assert_eq!(e.state().mode(), mode);
}

#[test]
fn reading_behind_the_charge_curve_is_rejected() {
    let mut e = charging_engine();
    let before = e.state().clone();
    let at = t0() + Duration::hours(1);

    let out = e.ingest(charging(at, 60.0, 120.0), at);

    assert_eq!(
        out,
        IngestOutcome::Stale {
            soc: 60.0,
            reason: StaleReason::BelowEstimate { estimate: 70.0 }
        }
    );
    assert_eq!(e.state(), &before);
}

#[test]
fn reading_ahead_of_the_curve_teaches_correction() {
    let mut e = SocEngine::default();
    e.ingest(charging(t0(), 60.0, 120.0), t0());
    let at = t0() + Duration::hours(1);

    let out = e.ingest(charging(at, 84.0, 48.0), at);

    // 24 points observed vs 20 expected: 0.3 * 1.2 + 0.7 * 1.0
    let IngestOutcome::Accepted { soc, learned } = out else {
        panic!("expected acceptance, got {out:?}");
    };
    assert_eq!(soc, 84.0);
    let factor = learned.correction_factor.unwrap();
    assert!((factor - 1.06).abs() < 1e-9);
    assert_eq!(learned.idle_drain_rate, None);
    assert!((e.state().charging_rate_pct_per_hour() - 20.0).abs() < 1e-9);
}

#[test]
fn unplugging_credits_the_charging_interval() {
    let mut e = SocEngine::default();
    e.ingest(charging(t0(), 60.0, 120.0), t0());
    let at = t0() + Duration::hours(1);

    let out = e.ingest(parked(at, 84.0), at);

    assert!(out.is_accepted());
    assert!((e.state().learned_correction_factor() - 1.06).abs() < 1e-9);
    assert_eq!(e.state().mode(), Mode::Idle);
    assert_eq!(e.state().charging_rate_pct_per_hour(), 0.0);
    assert_eq!(e.charging_rate(), Some(0.0));
}

#[test]
fn idle_vehicle_cannot_gain_charge() {
    let mut e = parked_engine();
    let at = t0() + Duration::hours(10);
    assert_eq!(e.estimate(at), Some(79.6));

    let out = e.ingest(parked(at, 85.0), at);

    assert_eq!(
        out,
        IngestOutcome::IdleGainIgnored {
            soc: 85.0,
            estimate: 79.6
        }
    );
    assert_eq!(e.state().baseline(), Some((80.0, t0())));
    assert_eq!(e.state().mode(), Mode::Idle);
}

#[test]
fn idle_drop_teaches_drain_rate() {
    let mut e = parked_engine();
    let at = t0() + Duration::hours(10);

    let out = e.ingest(parked(at, 78.0), at);

    // 0.2 %/h observed: 0.2 * 0.2 + 0.8 * 0.04
    let IngestOutcome::Accepted { learned, .. } = out else {
        panic!("expected acceptance, got {out:?}");
    };
    assert!((learned.idle_drain_rate.unwrap() - 0.072).abs() < 1e-9);
    assert_eq!(learned.correction_factor, None);
    assert_eq!(e.state().baseline(), Some((78.0, at)));
}

#[test]
fn driving_moves_the_baseline_without_learning() {
    let mut e = parked_engine();
    let at = t0() + Duration::hours(2);

    let out = e.ingest(driving(at, 70.0), at);

    let IngestOutcome::Accepted { learned, .. } = out else {
        panic!("expected acceptance, got {out:?}");
    };
    // previous mode was idle, so the drop is treated as drain
    assert!(learned.idle_drain_rate.is_some());
    assert_eq!(e.state().mode(), Mode::Active);

    let later = at + Duration::hours(1);
    let out = e.ingest(driving(later, 60.0), later);
    let IngestOutcome::Accepted { learned, .. } = out else {
        panic!("expected acceptance, got {out:?}");
    };
    assert_eq!(learned, soc_core::Learned::default());
    assert_eq!(e.estimate(later + Duration::hours(3)), Some(60.0));
}

#[test]
fn repeated_sample_is_idempotent() {
    let mut e = charging_engine();
    let at = t0() + Duration::hours(1);
    let s = charging(at, 72.0, 84.0);

    assert!(e.ingest(s.clone(), at).is_accepted());
    let after_first = e.state().clone();
    assert_eq!(e.ingest(s, at), IngestOutcome::Unchanged { soc: 72.0 });
    assert_eq!(e.state(), &after_first);
}

#[rstest]
#[case::missing(None)]
#[case::negative(Some(-1.0))]
#[case::above_full(Some(100.5))]
#[case::nan(Some(f64::NAN))]
fn unusable_reading_changes_nothing(#[case] soc: Option<f64>) {
    let mut e = charging_engine();
    let before = e.state().clone();
    let at = t0() + Duration::minutes(10);
    let s = RawSample {
        soc,
        is_charging: false,
        ignition_on: true,
        ..RawSample::empty(at)
    };

    assert_eq!(e.ingest(s, at), IngestOutcome::NoReading);
    assert_eq!(e.state(), &before);
}

#[test]
fn no_baseline_means_no_estimate() {
    let e = SocEngine::default();
    assert!(!e.is_available());
    assert_eq!(e.estimate(t0()), None);
    assert_eq!(e.charging_rate(), None);
}

#[test]
fn charging_estimate_never_passes_full() {
    let mut e = SocEngine::default();
    // 10 minutes to full from 95% is 30 %/h
    e.ingest(charging(t0(), 95.0, 10.0), t0());
    assert_eq!(e.estimate(t0() + Duration::minutes(90)), Some(100.0));
}
