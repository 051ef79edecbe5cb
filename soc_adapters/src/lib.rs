//! Adapters implementing the `soc_traits` ports: a simulated vehicle, recorded
//! telemetry playback and a JSON file store.

pub mod error;
pub mod replay;
pub mod sim;
pub mod store;

pub use error::AdapterError;
pub use replay::{ReplayVehicle, sample_from_row};
pub use sim::{SimulatedVehicle, VehicleModel};
pub use store::JsonFileStore;
