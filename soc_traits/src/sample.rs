//! Telemetry snapshot as reported by the vehicle API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Charger tier the vehicle reports being connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargingLevel {
    /// DC / level 3 / fast charger.
    DcFast,
    /// AC / level 2 charger.
    Ac,
    /// Anything the vehicle reports that we cannot classify.
    Unknown,
}

impl ChargingLevel {
    /// Classify the free-form value reported by the vehicle.
    ///
    /// Vehicles report this either as an integer tier or as a label such as
    /// `"LEVEL_2"` or `"DC_FAST"`. Matching is case-insensitive; DC markers
    /// win over AC markers.
    pub fn from_reported(raw: &str) -> Self {
        let s = raw.trim().to_ascii_uppercase();
        if s.contains('3') || s.contains("DC") || s.contains("FAST") {
            Self::DcFast
        } else if s.contains('2') || s.contains("AC") {
            Self::Ac
        } else {
            Self::Unknown
        }
    }
}

impl From<&str> for ChargingLevel {
    fn from(raw: &str) -> Self {
        Self::from_reported(raw)
    }
}

impl From<i64> for ChargingLevel {
    fn from(tier: i64) -> Self {
        Self::from_reported(&tier.to_string())
    }
}

/// One poll of the vehicle's telemetry. Every reading may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Battery state of charge in percent.
    pub soc: Option<f64>,
    pub is_charging: bool,
    pub ignition_on: bool,
    pub charging_level: Option<ChargingLevel>,
    pub time_to_full_level2_minutes: Option<f64>,
    pub time_to_full_level3_minutes: Option<f64>,
    /// When the snapshot was taken by the polling layer.
    pub timestamp: DateTime<Utc>,
}

impl RawSample {
    /// Sample with no readings at all (API outage).
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            soc: None,
            is_charging: false,
            ignition_on: false,
            charging_level: None,
            time_to_full_level2_minutes: None,
            time_to_full_level3_minutes: None,
            timestamp,
        }
    }

    /// Idle means not charging and ignition off.
    #[inline]
    pub fn is_idle(&self) -> bool {
        !self.is_charging && !self.ignition_on
    }
}
