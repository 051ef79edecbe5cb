//! Test and helper mocks for soc_core

use soc_traits::{RawSample, RefreshCommand, StateBlob, StateStore, TelemetrySource};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Source that hands out queued samples, then errors once exhausted.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    queue: VecDeque<RawSample>,
}

impl ScriptedSource {
    pub fn new(samples: impl IntoIterator<Item = RawSample>) -> Self {
        Self {
            queue: samples.into_iter().collect(),
        }
    }
}

impl TelemetrySource for ScriptedSource {
    fn snapshot(&mut self) -> Result<RawSample, BoxError> {
        self.queue
            .pop_front()
            .ok_or_else(|| Box::new(std::io::Error::other("no more samples")) as BoxError)
    }
}

/// Command that records how often it was issued and optionally fails.
#[derive(Debug, Clone, Default)]
pub struct CountingCommand {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl CountingCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails after being counted.
    pub fn failing() -> Self {
        Self {
            calls: Arc::default(),
            fail: true,
        }
    }

    /// Calls so far; clones share the counter.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl RefreshCommand for CountingCommand {
    fn deep_refresh(&mut self) -> Result<(), BoxError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            return Err(Box::new(std::io::Error::other("vehicle unreachable")));
        }
        Ok(())
    }
}

/// In-memory store; clones share the saved blob.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blob: Arc<Mutex<Option<StateBlob>>>,
    saves: Arc<AtomicUsize>,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded with a previously persisted blob.
    pub fn with_blob(blob: StateBlob) -> Self {
        Self {
            blob: Arc::new(Mutex::new(Some(blob))),
            ..Self::default()
        }
    }

    /// Loads nothing and rejects every save.
    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Option<StateBlob> {
        self.blob.lock().ok().and_then(|g| g.clone())
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

impl StateStore for MemoryStore {
    fn load(&mut self) -> Result<Option<StateBlob>, BoxError> {
        Ok(self.saved())
    }

    fn save(&mut self, blob: &StateBlob) -> Result<(), BoxError> {
        if self.fail_saves {
            return Err(Box::new(std::io::Error::other("disk full")));
        }
        let mut g = self
            .blob
            .lock()
            .map_err(|_| Box::new(std::io::Error::other("store lock poisoned")) as BoxError)?;
        *g = Some(blob.clone());
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
