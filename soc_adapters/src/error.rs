use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state file must hold a JSON object, found {0}")]
    NotAnObject(&'static str),
    #[error("recorded telemetry exhausted")]
    Exhausted,
    #[error("vehicle unreachable")]
    Unreachable,
}

pub type Result<T> = std::result::Result<T, AdapterError>;
