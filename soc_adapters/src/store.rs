//! File-backed persistence for the estimation state.

use soc_traits::{StateBlob, StateStore};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{AdapterError, Result};

/// Write `bytes` next to `path` and rename over it, so readers never see a
/// half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

/// Persists the state blob as pretty-printed JSON at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file does not exist yet.
    pub fn read(&self) -> Result<Option<StateBlob>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<serde_json::Value>(&text)? {
            serde_json::Value::Object(map) => Ok(Some(map)),
            serde_json::Value::Null => Err(AdapterError::NotAnObject("null")),
            serde_json::Value::Bool(_) => Err(AdapterError::NotAnObject("a boolean")),
            serde_json::Value::Number(_) => Err(AdapterError::NotAnObject("a number")),
            serde_json::Value::String(_) => Err(AdapterError::NotAnObject("a string")),
            serde_json::Value::Array(_) => Err(AdapterError::NotAnObject("an array")),
        }
    }

    pub fn write(&self, blob: &StateBlob) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(blob)?;
        write_atomic(&self.path, &bytes)?;
        tracing::trace!(path = %self.path.display(), "persisted estimation state");
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn load(&mut self) -> std::result::Result<Option<StateBlob>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.read()?)
    }

    fn save(&mut self, blob: &StateBlob) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.write(blob)?)
    }
}
