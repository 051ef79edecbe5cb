#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Vehicle state-of-charge estimation (transport-agnostic).
//!
//! Vehicle APIs report SOC sporadically and frequently serve cached values.
//! This crate keeps a per-vehicle estimate between reports and calibrates
//! itself from the reports it does get. All vehicle interaction goes through
//! the `soc_traits::TelemetrySource`, `soc_traits::RefreshCommand` and
//! `soc_traits::StateStore` traits.
//!
//! ## Architecture
//!
//! - **Rate model**: time-to-full → %/h charging rate (`rate` module)
//! - **State**: baseline, mode flags and learned coefficients with their
//!   persistence format (`state` module)
//! - **Ingestion**: stale-data rejection and baseline updates (`ingest`)
//! - **Learning**: EMA correction factor and idle drain (`learner`)
//! - **Extrapolation**: read-only projection from the baseline (`extrapolate`)
//! - **Scheduling**: tick/poll timers and the daily deep refresh (`schedule`,
//!   `driver`)
//!
//! ## Units
//!
//! SOC is a percentage in `[0, 100]`, rates are percentage points per hour,
//! time-to-full values are minutes. Published estimates are rounded to 0.1.

// Module declarations
pub mod builder;
pub mod config;
pub mod conversions;
pub mod driver;
pub mod engine;
pub mod error;
pub mod extrapolate;
pub mod ingest;
pub mod learner;
pub mod mocks;
pub mod rate;
pub mod schedule;
pub mod state;
pub mod util;

pub use builder::DriverBuilder;
pub use config::{DeepRefreshCfg, EstimatorCfg, ScheduleCfg};
pub use driver::{Observation, TimerControl, VehicleDriver, VehicleWorker};
pub use engine::SocEngine;
pub use error::{BuildError, EngineError, Result};
pub use ingest::{IngestOutcome, Learned, StaleReason};
pub use rate::{calculate_charging_rate, select_time_to_full};
pub use schedule::RefreshSlot;
pub use state::{EstimationState, Mode};
