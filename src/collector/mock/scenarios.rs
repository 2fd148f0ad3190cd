//! Pre-built host scenarios for testing.
//!
//! Each scenario returns a scripted runner plus a filesystem describing one
//! consistent host state.

use super::filesystem::MockFs;
use super::runner::MockRunner;
use crate::collector::traits::CommandOutput;

pub const ZRAMCTL_JSON: &str = "zramctl --output-all --bytes --json";
pub const ZRAMCTL_RAW: &str = "zramctl --output-all --bytes --noheadings --raw";
pub const SWAPON_SHOW: &str = "swapon --show=NAME,TYPE,SIZE,USED,PRIO --bytes --noheadings --raw";

/// `MemAvailable` of every scenario: 500 MiB.
pub const AVAILABLE_KB: u64 = 500 * 1024;

/// `zramctl --json` output of [`two_devices`].
pub const TWO_DEVICES_JSON: &str = r#"{
   "zramctl": [
      {"name":"/dev/zram0", "disksize":536870912, "data":104857600, "compr":26214400, "algorithm":"lz4", "streams":4, "zero-pages":0, "total":28311552, "mem-limit":0, "mem-used":28311552, "migrated":0, "mountpoint":"[SWAP]"},
      {"name":"/dev/zram1", "disksize":1073741824, "data":52428800, "compr":10485760, "algorithm":"zstd", "streams":4, "zero-pages":0, "total":12582912, "mem-limit":0, "mem-used":12582912, "migrated":0, "mountpoint":"[SWAP]"}
   ]
}
"#;

/// `zramctl --json` output with `/dev/zram1` (50 MiB data) next to
/// `/dev/zram10` (4 GiB data).
pub const ZRAM1_AND_ZRAM10_JSON: &str = r#"{
   "zramctl": [
      {"name":"/dev/zram1", "disksize":1073741824, "data":52428800, "compr":10485760, "algorithm":"zstd", "streams":4, "zero-pages":0, "total":12582912, "mem-limit":0, "mem-used":12582912, "migrated":0, "mountpoint":"[SWAP]"},
      {"name":"/dev/zram10", "disksize":8589934592, "data":4294967296, "compr":1073741824, "algorithm":"zstd", "streams":4, "zero-pages":0, "total":1101004800, "mem-limit":0, "mem-used":1101004800, "migrated":0, "mountpoint":"[SWAP]"}
   ]
}
"#;

/// `swapon --show` output of [`two_devices`].
pub const TWO_DEVICES_SWAPS: &str = "\
/dev/zram0 partition 536870912 104857600 100
/dev/zram1 partition 1073741824 52428800 50
/swapfile file 2147483648 536870912 -2
";

/// Host with the zram module loaded but no devices and no swap.
pub fn empty_host() -> (MockRunner, MockFs) {
    let runner = MockRunner::new();
    runner.on(ZRAMCTL_JSON, CommandOutput::ok(""));
    runner.on(ZRAMCTL_RAW, CommandOutput::ok(""));
    runner.on(SWAPON_SHOW, CommandOutput::ok(""));

    let mut fs = MockFs::new();
    fs.add_meminfo(AVAILABLE_KB);
    fs.add_dir("/sys/block");
    fs.add_dir("/sys/module/zram");
    (runner, fs)
}

/// Host with two active zram swaps and one swap file.
///
/// - `/dev/zram0`: 512M lz4, 100 MiB data, prio 100, ticks 150+400
/// - `/dev/zram1`: 1G zstd, 50 MiB data, prio 50, ticks 10+20
/// - `/swapfile`: 2G, 512 MiB used (1536 MiB free)
pub fn two_devices() -> (MockRunner, MockFs) {
    let runner = MockRunner::new();
    runner.on(ZRAMCTL_JSON, CommandOutput::ok(TWO_DEVICES_JSON));
    runner.on(SWAPON_SHOW, CommandOutput::ok(TWO_DEVICES_SWAPS));

    let mut fs = MockFs::new();
    fs.add_meminfo(AVAILABLE_KB);
    fs.add_dir("/sys/module/zram");
    fs.add_block_device("zram0", 150, 400);
    fs.add_block_device("zram1", 10, 20);
    fs.add_block_device("sda", 90000, 90000);
    (runner, fs)
}
