//! Recorded telemetry played back as a `TelemetrySource`.

use soc_config::TelemetryRow;
use soc_traits::{ChargingLevel, RawSample, RefreshCommand, TelemetrySource};
use std::collections::VecDeque;

use crate::error::AdapterError;

/// Hands out recorded samples in order; errors once the recording is done.
///
/// A deep refresh cannot make a recording report anything new, so the command
/// side only counts requests.
#[derive(Debug, Default, Clone)]
pub struct ReplayVehicle {
    queue: VecDeque<RawSample>,
    refresh_requests: usize,
}

impl ReplayVehicle {
    pub fn new(samples: impl IntoIterator<Item = RawSample>) -> Self {
        Self {
            queue: samples.into_iter().collect(),
            refresh_requests: 0,
        }
    }

    pub fn from_rows(rows: &[TelemetryRow]) -> Self {
        Self::new(rows.iter().map(sample_from_row))
    }

    /// Timestamp of the next sample, which replay drivers use as "now".
    pub fn next_timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.queue.front().map(|s| s.timestamp)
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn refresh_requests(&self) -> usize {
        self.refresh_requests
    }
}

/// Map one CSV row onto the sample shape the engine consumes.
pub fn sample_from_row(r: &TelemetryRow) -> RawSample {
    RawSample {
        soc: r.soc,
        is_charging: r.is_charging,
        ignition_on: r.ignition_on,
        charging_level: r.charging_level.as_deref().map(ChargingLevel::from_reported),
        time_to_full_level2_minutes: r.time_to_full_l2,
        time_to_full_level3_minutes: r.time_to_full_l3,
        timestamp: r.timestamp,
    }
}

impl TelemetrySource for ReplayVehicle {
    fn snapshot(&mut self) -> Result<RawSample, Box<dyn std::error::Error + Send + Sync>> {
        self.queue
            .pop_front()
            .ok_or_else(|| AdapterError::Exhausted.into())
    }
}

impl RefreshCommand for ReplayVehicle {
    fn deep_refresh(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.refresh_requests += 1;
        tracing::debug!("deep refresh requested during replay; ignored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn rows_map_onto_samples() {
        let rows = soc_config::parse_telemetry_csv(
            "timestamp,soc,is_charging,ignition_on,charging_level,time_to_full_l2,time_to_full_l3\n\
             2024-05-01T18:00:00Z,60.0,true,false,LEVEL_3,,45\n"
                .as_bytes(),
        )
        .unwrap();
        let s = sample_from_row(&rows[0]);
        assert_eq!(s.soc, Some(60.0));
        assert_eq!(s.charging_level, Some(ChargingLevel::DcFast));
        assert_eq!(s.time_to_full_level3_minutes, Some(45.0));
        assert_eq!(s.time_to_full_level2_minutes, None);
    }

    #[test]
    fn plays_in_order_then_exhausts() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut r = ReplayVehicle::new([RawSample::empty(t), RawSample::empty(t)]);
        assert_eq!(r.next_timestamp(), Some(t));
        assert!(r.snapshot().is_ok());
        assert!(r.snapshot().is_ok());
        let err = r.snapshot().unwrap_err();
        assert!(err.to_string().contains("exhausted"));
        assert_eq!(r.remaining(), 0);
    }
}
