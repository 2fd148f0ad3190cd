//! Device Inventory Reader: what zram devices exist and what they hold.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collector::parser::{
    SwapArea, parse_block_stat_ticks, parse_swapon, parse_zramctl_json, parse_zramctl_raw,
};
use crate::collector::traits::{CommandRunner, FileSystem};
use crate::error::{Result, ZramError};

/// Priority reported for devices that are not an active swap area.
pub const PRIORITY_AUTO: i32 = -1;

/// One zram device as seen by the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZramDevice {
    /// Device path, e.g. `/dev/zram0`.
    pub name: String,
    /// Configured disk size in bytes.
    pub disksize: u64,
    /// Uncompressed data resident in the device, bytes.
    pub data: u64,
    /// Compressed size of `data`, bytes.
    pub compr: u64,
    /// Compression algorithm token.
    pub algorithm: String,
    /// Total physical memory charged, including allocator overhead, bytes.
    pub total: u64,
    /// Swap priority, `-1` when the kernel picks or the device is not swap.
    pub priority: i32,
    /// Cumulative read+write I/O ticks (ms).
    pub io_ticks: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streams: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<String>,
}

impl Default for ZramDevice {
    fn default() -> Self {
        Self {
            name: String::new(),
            disksize: 0,
            data: 0,
            compr: 0,
            algorithm: String::new(),
            total: 0,
            priority: PRIORITY_AUTO,
            io_ticks: 0,
            streams: None,
            mountpoint: None,
        }
    }
}

impl ZramDevice {
    /// Kernel name without the `/dev/` prefix (`zram0`).
    pub fn kernel_name(&self) -> &str {
        kernel_name(&self.name)
    }
}

/// Strips a leading `/dev/` from a device path.
pub fn kernel_name(device: &str) -> &str {
    device.strip_prefix("/dev/").unwrap_or(device)
}

/// Turns `zram0` or `/dev/zram0` into `/dev/zram0`.
pub fn device_path(device: &str) -> String {
    if device.starts_with("/dev/") {
        device.to_string()
    } else {
        format!("/dev/{}", device)
    }
}

/// Reads the set of zram devices and their counters.
///
/// Device listing goes through `zramctl`; tick counters through
/// `/sys/block/<dev>/stat`.
#[derive(Clone)]
pub struct DeviceInventory<R: CommandRunner, F: FileSystem> {
    runner: R,
    fs: F,
    sys_path: String,
}

impl<R: CommandRunner, F: FileSystem> DeviceInventory<R, F> {
    /// Creates a new inventory reader.
    ///
    /// # Arguments
    /// * `runner` - Command runner (real or mock)
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `sys_path` - Base path to sysfs (usually "/sys")
    pub fn new(runner: R, fs: F, sys_path: impl Into<String>) -> Self {
        Self {
            runner,
            fs,
            sys_path: sys_path.into(),
        }
    }

    /// Lists zram devices, enriched with swap priority and I/O ticks.
    ///
    /// The structured JSON mode is tried first; on spawn failure, non-zero
    /// exit or empty output the positional raw mode is used instead.
    pub fn list_devices(&self) -> Result<Vec<ZramDevice>> {
        let mut devices = match self.list_json() {
            Some(devices) => devices,
            None => self.list_raw()?,
        };

        match self.swap_areas() {
            Ok(areas) => {
                for device in &mut devices {
                    if let Some(area) = areas.iter().find(|a| a.name == device.name) {
                        device.priority = area.priority;
                    }
                }
            }
            Err(e) => debug!(error = %e, "swap areas unavailable, priorities left unknown"),
        }

        for device in &mut devices {
            match self.read_io_ticks(&device.name) {
                Ok(ticks) => device.io_ticks = ticks,
                Err(e) => debug!(device = %device.name, error = %e, "io ticks unavailable"),
            }
        }

        Ok(devices)
    }

    fn list_json(&self) -> Option<Vec<ZramDevice>> {
        let output = match self
            .runner
            .run("zramctl", &["--output-all", "--bytes", "--json"])
        {
            Ok(output) => output,
            Err(e) => {
                debug!(error = %e, "zramctl --json failed to run");
                return None;
            }
        };

        if !output.success() {
            debug!(status = %output.describe_failure(), "zramctl --json unsupported");
            return None;
        }
        // zramctl prints nothing at all when no device is configured.
        if output.stdout.trim().is_empty() {
            return None;
        }

        match parse_zramctl_json(&output.stdout) {
            Ok(devices) => Some(devices),
            Err(e) => {
                warn!(error = %e, "unparseable zramctl json, falling back to raw output");
                None
            }
        }
    }

    fn list_raw(&self) -> Result<Vec<ZramDevice>> {
        let output = self
            .runner
            .run(
                "zramctl",
                &["--output-all", "--bytes", "--noheadings", "--raw"],
            )
            .map_err(|e| ZramError::Query(format!("zramctl: {}", e)))?;

        if !output.success() {
            return Err(ZramError::Query(format!(
                "zramctl: {}",
                output.describe_failure()
            )));
        }

        Ok(parse_zramctl_raw(&output.stdout))
    }

    fn stat_path(&self, device: &str) -> PathBuf {
        Path::new(&self.sys_path)
            .join("block")
            .join(kernel_name(device))
            .join("stat")
    }

    /// Reads read-ticks + write-ticks for one device.
    pub fn read_io_ticks(&self, device: &str) -> Result<u64> {
        let path = self.stat_path(device);
        let content = self
            .fs
            .read_to_string(&path)
            .map_err(|e| ZramError::Query(format!("{}: {}", path.display(), e)))?;
        parse_block_stat_ticks(&content).map_err(|e| ZramError::Query(e.message))
    }

    /// Sums I/O ticks across every `zram*` block device.
    ///
    /// Devices whose stat file vanishes mid-scan (concurrent reset) are skipped.
    pub fn total_io_ticks(&self) -> Result<u64> {
        let block = Path::new(&self.sys_path).join("block");
        let entries = self
            .fs
            .read_dir(&block)
            .map_err(|e| ZramError::Query(format!("{}: {}", block.display(), e)))?;

        let mut total: u64 = 0;
        for entry in entries {
            let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with("zram") {
                continue;
            }
            match self.read_io_ticks(name) {
                Ok(ticks) => total = total.wrapping_add(ticks),
                Err(e) => debug!(device = name, error = %e, "skipping device without stat"),
            }
        }
        Ok(total)
    }

    /// Lists active swap areas (zram and otherwise).
    pub fn swap_areas(&self) -> Result<Vec<SwapArea>> {
        let output = self
            .runner
            .run(
                "swapon",
                &[
                    "--show=NAME,TYPE,SIZE,USED,PRIO",
                    "--bytes",
                    "--noheadings",
                    "--raw",
                ],
            )
            .map_err(|e| ZramError::Query(format!("swapon: {}", e)))?;

        if !output.success() {
            return Err(ZramError::Query(format!(
                "swapon: {}",
                output.describe_failure()
            )));
        }

        Ok(parse_swapon(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, MockRunner, scenarios};
    use crate::collector::traits::CommandOutput;

    #[test]
    fn test_list_devices_prefers_json() {
        let (runner, fs) = scenarios::two_devices();
        let inventory = DeviceInventory::new(runner.clone(), fs, "/sys");

        let devices = inventory.list_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "/dev/zram0");
        assert_eq!(devices[0].priority, 100);
        assert_eq!(devices[0].io_ticks, 150 + 400);
        assert_eq!(devices[1].priority, 50);

        assert!(
            !runner
                .calls()
                .iter()
                .any(|c| c.contains("--noheadings --raw") && c.starts_with("zramctl"))
        );
    }

    #[test]
    fn test_list_devices_falls_back_to_raw() {
        let runner = MockRunner::new();
        runner.on(
            "zramctl --output-all --bytes --json",
            CommandOutput::failed(1, "zramctl: unrecognized option '--json'"),
        );
        runner.on(
            "zramctl --output-all --bytes --noheadings --raw",
            CommandOutput::ok("/dev/zram0 536870912 1048576 262144 lzo-rle 4 0 300000\n"),
        );
        let inventory = DeviceInventory::new(runner, MockFs::new(), "/sys");

        let devices = inventory.list_devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].algorithm, "lzo-rle");
        assert_eq!(devices[0].total, 300000);
        // swapon unavailable and no stat file: best-effort fields keep defaults
        assert_eq!(devices[0].priority, PRIORITY_AUTO);
        assert_eq!(devices[0].io_ticks, 0);
    }

    #[test]
    fn test_list_devices_falls_back_on_empty_json_output() {
        let runner = MockRunner::new();
        runner.on("zramctl --output-all --bytes --json", CommandOutput::ok(""));
        runner.on(
            "zramctl --output-all --bytes --noheadings --raw",
            CommandOutput::ok(""),
        );
        let inventory = DeviceInventory::new(runner, MockFs::new(), "/sys");
        assert!(inventory.list_devices().unwrap().is_empty());
    }

    #[test]
    fn test_list_devices_without_zramctl_is_query_error() {
        let inventory = DeviceInventory::new(MockRunner::new(), MockFs::new(), "/sys");
        assert!(matches!(
            inventory.list_devices(),
            Err(ZramError::Query(_))
        ));
    }

    #[test]
    fn test_read_io_ticks_missing_stat() {
        let inventory = DeviceInventory::new(MockRunner::new(), MockFs::new(), "/sys");
        assert!(matches!(
            inventory.read_io_ticks("/dev/zram7"),
            Err(ZramError::Query(_))
        ));
    }

    #[test]
    fn test_total_io_ticks_only_counts_zram() {
        let mut fs = MockFs::new();
        fs.add_file(
            "/sys/block/zram0/stat",
            "10 0 80 100 20 0 160 50 0 60 150 0 0 0 0",
        );
        fs.add_file(
            "/sys/block/zram1/stat",
            "10 0 80 7 20 0 160 3 0 60 150 0 0 0 0",
        );
        fs.add_file(
            "/sys/block/sda/stat",
            "10 0 80 9999 20 0 160 9999 0 60 150 0 0 0 0",
        );
        let inventory = DeviceInventory::new(MockRunner::new(), fs, "/sys");
        assert_eq!(inventory.total_io_ticks().unwrap(), 160);
    }

    #[test]
    fn test_device_path_helpers() {
        assert_eq!(device_path("zram0"), "/dev/zram0");
        assert_eq!(device_path("/dev/zram0"), "/dev/zram0");
        assert_eq!(kernel_name("/dev/zram3"), "zram3");
    }
}
