pub mod clock;
pub mod sample;

pub use clock::{Clock, ManualClock, SystemClock};
pub use sample::{ChargingLevel, RawSample};

/// Persisted key/value blob for one vehicle's estimation state.
pub type StateBlob = serde_json::Map<String, serde_json::Value>;

/// Pull-based access to the vehicle's current telemetry snapshot.
pub trait TelemetrySource {
    fn snapshot(&mut self) -> Result<RawSample, Box<dyn std::error::Error + Send + Sync>>;
}

/// Remote commands issued to the vehicle through the account API.
pub trait RefreshCommand {
    /// Ask the vehicle to wake up and report fresh telemetry.
    fn deep_refresh(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Persistence port for the estimation state.
pub trait StateStore {
    /// `Ok(None)` when nothing has been persisted yet.
    fn load(&mut self) -> Result<Option<StateBlob>, Box<dyn std::error::Error + Send + Sync>>;
    fn save(&mut self, blob: &StateBlob) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: StateStore + ?Sized> StateStore for Box<T> {
    fn load(&mut self) -> Result<Option<StateBlob>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).load()
    }

    fn save(&mut self, blob: &StateBlob) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).save(blob)
    }
}
