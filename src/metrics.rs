//! Metrics Collector: periodic memory-saved and load sampling.
//!
//! Runs as a single long-lived loop. Each cycle sums `data` and `total`
//! over all zram devices, reads the summed I/O ticks, turns the tick delta
//! into a busy percentage and appends a [`HistorySample`] to the bounded
//! history, which is then persisted whole.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{Local, Utc};
use tracing::{debug, error, info, warn};

use crate::collector::{
    Acquire, CommandRunner, DeviceInventory, FileSystem, InstanceLock, ProcessProbe,
};
use crate::error::Result;
use crate::fmt::{FmtStyle, format_bytes};
use crate::history::{History, HistorySample, HistoryStore};

/// Default sampling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(12);

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Turns cumulative tick counters into a busy percentage.
#[derive(Debug, Clone, Default)]
pub struct LoadTracker {
    /// `(ticks, wall clock ms)` of the previous sample.
    last: Option<(u64, i64)>,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sample and returns `100 * Δticks / Δms`, one decimal.
    ///
    /// Returns 0 for the first sample, when the counter went backwards
    /// (device reset, wrap) and when the clock did not advance.
    pub fn sample(&mut self, ticks: u64, now_ms: i64) -> f64 {
        let load = match self.last {
            Some((prev_ticks, prev_ms)) if now_ms > prev_ms && ticks >= prev_ticks => {
                let pct = 100.0 * (ticks - prev_ticks) as f64 / (now_ms - prev_ms) as f64;
                (pct * 10.0).round() / 10.0
            }
            _ => 0.0,
        };
        self.last = Some((ticks, now_ms));
        load
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Raw values read in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub memory_saved: u64,
    pub io_ticks: u64,
}

pub struct MetricsCollector<R: CommandRunner, F: FileSystem, H: HistoryStore> {
    inventory: DeviceInventory<R, F>,
    store: H,
    history: History,
    tracker: LoadTracker,
    interval: Duration,
}

impl<R: CommandRunner, F: FileSystem, H: HistoryStore> MetricsCollector<R, F, H> {
    pub fn new(inventory: DeviceInventory<R, F>, store: H, capacity: usize) -> Self {
        Self {
            inventory,
            store,
            history: History::new(capacity),
            tracker: LoadTracker::new(),
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Replaces the in-memory history with the persisted one, newest samples first to survive.
    pub fn load_history(&mut self) {
        match self.store.load() {
            Ok(samples) => {
                let persisted = samples.len();
                self.history = History::from_samples(self.history.capacity(), samples);
                if persisted > self.history.len() {
                    info!(
                        persisted,
                        kept = self.history.len(),
                        "history truncated to capacity"
                    );
                }
            }
            Err(e) => warn!(error = %e, "starting with empty history"),
        }
    }

    /// Reads memory saved and summed I/O ticks.
    pub fn read_reading(&self) -> Result<Reading> {
        let devices = self.inventory.list_devices()?;
        let data: u64 = devices.iter().map(|d| d.data).sum();
        let used: u64 = devices.iter().map(|d| d.total).sum();
        let io_ticks = self.inventory.total_io_ticks()?;
        Ok(Reading {
            memory_saved: data.saturating_sub(used),
            io_ticks,
        })
    }

    /// Appends a sample for `reading` and persists the history.
    ///
    /// The sample stays in memory even if persisting fails.
    pub fn record(&mut self, reading: Reading, now_ms: i64, label: String) -> Result<HistorySample> {
        let sample = HistorySample {
            timestamp_label: label,
            memory_saved: reading.memory_saved,
            load_pct: self.tracker.sample(reading.io_ticks, now_ms),
        };
        self.history.push(sample.clone());
        self.store.save(&self.history)?;
        Ok(sample)
    }

    /// One collection cycle at the current time.
    pub fn tick(&mut self) -> Result<HistorySample> {
        let reading = self.read_reading()?;
        let label = Local::now().format("%H:%M:%S").to_string();
        let sample = self.record(reading, Utc::now().timestamp_millis(), label)?;
        debug!(
            saved = %format_bytes(sample.memory_saved, FmtStyle::Compact),
            load = sample.load_pct,
            "polling complete"
        );
        Ok(sample)
    }

    /// Samples until `running` is cleared. Returns the number of samples taken.
    ///
    /// Exits at once with zero samples, without calling `startup`, when
    /// another live instance holds the pid file. Otherwise `startup` runs
    /// while the pid file is held, before the first sample. Cycle failures
    /// are logged and the loop carries on.
    pub fn run<P: ProcessProbe>(
        &mut self,
        lock: &InstanceLock<P>,
        own_pid: u32,
        running: &AtomicBool,
        startup: impl FnOnce(),
    ) -> Result<u64> {
        let _guard = match lock.acquire(own_pid)? {
            Acquire::Acquired(guard) => guard,
            Acquire::AlreadyRunning(pid) => {
                info!(pid, "collector already running, exiting");
                return Ok(0);
            }
        };

        startup();
        self.load_history();
        info!(
            interval_secs = self.interval.as_secs(),
            capacity = self.history.capacity(),
            samples = self.history.len(),
            "collection loop started"
        );

        let mut samples: u64 = 0;
        while running.load(Ordering::SeqCst) {
            match self.tick() {
                Ok(_) => samples += 1,
                Err(e) => error!(error = %e, "collection cycle failed"),
            }

            let mut remaining = self.interval;
            while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
                let slice = remaining.min(SLEEP_SLICE);
                std::thread::sleep(slice);
                remaining = remaining.saturating_sub(slice);
            }
        }

        info!(samples, "collection loop stopped");
        Ok(samples)
    }
}
