//! Bounded sample history and its persistence.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::util::write_atomic;

/// Default history capacity: one hour at the default 12 s interval.
pub const DEFAULT_CAPACITY: usize = 300;

/// One collector sample.
///
/// Serialized with the short keys dashboards read (`t`, `s`, `l`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    /// Local wall-clock time, `HH:MM:SS`.
    #[serde(rename = "t", alias = "timestamp_label")]
    pub timestamp_label: String,
    /// Bytes of RAM saved by compression.
    #[serde(rename = "s", alias = "memory_saved")]
    pub memory_saved: u64,
    /// Device busy percentage, one decimal.
    #[serde(rename = "l", alias = "load_pct")]
    pub load_pct: f64,
}

/// Fixed-capacity FIFO of samples; the oldest sample is evicted first.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    capacity: usize,
    samples: VecDeque<HistorySample>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Builds a history from previously persisted samples, keeping the newest.
    pub fn from_samples(capacity: usize, samples: Vec<HistorySample>) -> Self {
        let mut history = Self::new(capacity);
        for sample in samples {
            history.push(sample);
        }
        history
    }

    pub fn push(&mut self, sample: HistorySample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&HistorySample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistorySample> {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<HistorySample> {
        self.samples.iter().cloned().collect()
    }
}

/// Where the collector keeps its history between runs.
pub trait HistoryStore {
    /// Returns persisted samples, oldest first. Nothing persisted yet is not an error.
    fn load(&self) -> Result<Vec<HistorySample>>;

    /// Replaces the persisted history as a whole.
    fn save(&self, history: &History) -> Result<()>;
}

/// JSON array on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonHistoryStore {
    path: PathBuf,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonHistoryStore {
    fn load(&self) -> Result<Vec<HistorySample>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&content) {
            Ok(samples) => Ok(samples),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "discarding unreadable history");
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, history: &History) -> Result<()> {
        let samples: Vec<&HistorySample> = history.iter().collect();
        let json = serde_json::to_vec(&samples)?;
        write_atomic(&self.path, &json)?;
        Ok(())
    }
}
