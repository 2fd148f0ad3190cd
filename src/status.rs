//! Status Aggregator: per-device listing plus totals.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::collector::{CommandRunner, DeviceInventory, FileSystem, ZramDevice};

/// Totals across all devices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    /// Uncompressed bytes held.
    pub total_original: u64,
    pub total_compressed: u64,
    /// Physical memory charged, allocator overhead included.
    pub total_used: u64,
    pub disk_size_total: u64,
    pub memory_saved: u64,
    /// `total_original / total_compressed`, two decimals; 0 without compressed data.
    pub compression_ratio: f64,
}

pub fn aggregate(devices: &[ZramDevice]) -> AggregateSnapshot {
    let mut agg = AggregateSnapshot::default();
    for d in devices {
        agg.total_original = agg.total_original.saturating_add(d.data);
        agg.total_compressed = agg.total_compressed.saturating_add(d.compr);
        agg.total_used = agg.total_used.saturating_add(d.total);
        agg.disk_size_total = agg.disk_size_total.saturating_add(d.disksize);
    }
    agg.memory_saved = agg.total_original.saturating_sub(agg.total_used);
    agg.compression_ratio = if agg.total_compressed > 0 {
        let ratio = agg.total_original as f64 / agg.total_compressed as f64;
        (ratio * 100.0).round() / 100.0
    } else {
        0.0
    };
    agg
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Unix seconds.
    pub timestamp: i64,
    pub devices: Vec<ZramDevice>,
    pub aggregates: AggregateSnapshot,
}

impl StatusReport {
    pub fn from_devices(timestamp: i64, devices: Vec<ZramDevice>) -> Self {
        let aggregates = aggregate(&devices);
        Self {
            timestamp,
            devices,
            aggregates,
        }
    }
}

pub struct StatusAggregator<R: CommandRunner, F: FileSystem> {
    inventory: DeviceInventory<R, F>,
}

impl<R: CommandRunner, F: FileSystem> StatusAggregator<R, F> {
    pub fn new(inventory: DeviceInventory<R, F>) -> Self {
        Self { inventory }
    }

    /// Current report. A failed query yields an empty report, never an error.
    pub fn snapshot(&self) -> StatusReport {
        let devices = match self.inventory.list_devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!(error = %e, "device query failed, reporting no devices");
                Vec::new()
            }
        };
        StatusReport::from_devices(Utc::now().timestamp(), devices)
    }
}
