use thiserror::Error;

/// Failures of the worker's collaborators, published as observations.
///
/// None of these ever reach the estimator itself: a failed poll leaves the
/// state untouched and a failed save is retried after the next mutation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("telemetry error: {0}")]
    Telemetry(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("remote command failed: {0}")]
    Command(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing telemetry source")]
    MissingSource,
    #[error("missing refresh command")]
    MissingCommand,
    #[error("missing state store")]
    MissingStore,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
