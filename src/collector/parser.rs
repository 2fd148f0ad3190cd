//! Parsers for kernel tool output and kernel files.
//!
//! These are pure functions that turn the text produced by `zramctl`,
//! `swapon`, `/proc/meminfo` and `/sys/block/<dev>/stat` into structured
//! data. They are designed to be easily testable with string inputs.

use serde_json::Value;

use crate::collector::ZramDevice;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

// ============ zramctl ============

/// Reads a byte counter that zramctl may emit either as a JSON number or as a
/// numeric string (older util-linux releases quote every value).
fn json_u64(obj: &Value, key: &str) -> u64 {
    match obj.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn json_string(obj: &Value, key: &str) -> Option<String> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses `zramctl --output-all --bytes --json`.
///
/// Format: `{"zramctl": [{"name": "/dev/zram0", "disksize": 536870912, ...}]}`.
/// A document without the `zramctl` key describes a host with no devices.
pub fn parse_zramctl_json(content: &str) -> Result<Vec<ZramDevice>, ParseError> {
    let doc: Value = serde_json::from_str(content)
        .map_err(|e| ParseError::new(format!("invalid zramctl json: {}", e)))?;

    let Some(entries) = doc.get("zramctl") else {
        return Ok(Vec::new());
    };
    let entries = entries
        .as_array()
        .ok_or_else(|| ParseError::new("zramctl key is not an array"))?;

    let mut devices = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = json_string(entry, "name")
            .ok_or_else(|| ParseError::new("zramctl entry without name"))?;
        devices.push(ZramDevice {
            name,
            disksize: json_u64(entry, "disksize"),
            data: json_u64(entry, "data"),
            compr: json_u64(entry, "compr"),
            algorithm: json_string(entry, "algorithm").unwrap_or_default(),
            streams: json_string(entry, "streams").and_then(|s| s.parse().ok()),
            total: json_u64(entry, "total"),
            mountpoint: json_string(entry, "mountpoint"),
            ..ZramDevice::default()
        });
    }

    Ok(devices)
}

/// Parses `zramctl --output-all --bytes --noheadings --raw`.
///
/// Columns are matched by position:
/// `NAME DISKSIZE DATA COMPR ALGORITHM STREAMS ZERO-PAGES TOTAL MEM-LIMIT MEM-USED MIGRATED MOUNTPOINT`.
/// Lines with fewer than five columns are skipped; missing trailing columns
/// read as zero or empty.
pub fn parse_zramctl_raw(content: &str) -> Vec<ZramDevice> {
    let mut devices = Vec::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 5 {
            continue;
        }

        let get_val =
            |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        devices.push(ZramDevice {
            name: parts[0].to_string(),
            disksize: get_val(1),
            data: get_val(2),
            compr: get_val(3),
            algorithm: parts[4].to_string(),
            streams: parts.get(5).and_then(|s| s.parse().ok()),
            total: get_val(7),
            mountpoint: parts.get(11).map(|s| s.to_string()),
            ..ZramDevice::default()
        });
    }

    devices
}

/// Parses the device path printed by `zramctl --find`.
///
/// Only the last non-empty line is meaningful.
pub fn parse_zramctl_find(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .map(str::to_string)
}

// ============ /sys/block/<dev>/stat ============

/// Position of the read-ticks field in `/sys/block/<dev>/stat`.
const STAT_READ_TICKS: usize = 3;
/// Position of the write-ticks field in `/sys/block/<dev>/stat`.
const STAT_WRITE_TICKS: usize = 7;

/// Parses `/sys/block/<dev>/stat` and returns read ticks + write ticks (ms).
///
/// Format: `reads r_merged r_sectors r_ticks writes w_merged w_sectors w_ticks in_flight io_ticks time_in_queue ...`
/// The sum wraps like the underlying kernel counters do.
pub fn parse_block_stat_ticks(content: &str) -> Result<u64, ParseError> {
    let fields: Vec<&str> = content.split_whitespace().collect();
    if fields.len() <= STAT_WRITE_TICKS {
        return Err(ParseError::new(format!(
            "not enough fields in block stat: expected {}+, got {}",
            STAT_WRITE_TICKS + 1,
            fields.len()
        )));
    }

    let parse_field = |idx: usize, name: &str| -> Result<u64, ParseError> {
        fields[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    let read = parse_field(STAT_READ_TICKS, "read_ticks")?;
    let write = parse_field(STAT_WRITE_TICKS, "write_ticks")?;
    Ok(read.wrapping_add(write))
}

// ============ /proc/meminfo ============

/// Extracts `MemAvailable` from `/proc/meminfo`, in bytes.
///
/// `MemFree` is deliberately not used: it ignores reclaimable page cache.
pub fn parse_mem_available(content: &str) -> Result<u64, ParseError> {
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("MemAvailable:") {
            let kb: u64 = rest
                .split_whitespace()
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| ParseError::new("invalid MemAvailable value"))?;
            return Ok(kb * 1024);
        }
    }
    Err(ParseError::new("MemAvailable not found in meminfo"))
}

// ============ swapon ============

/// One active swap area as listed by `swapon`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapArea {
    pub name: String,
    pub kind: String,
    pub size: u64,
    pub used: u64,
    pub priority: i32,
}

impl SwapArea {
    pub fn is_zram(&self) -> bool {
        self.name.contains("zram")
    }

    pub fn free(&self) -> u64 {
        self.size.saturating_sub(self.used)
    }
}

/// Parses `swapon --show=NAME,TYPE,SIZE,USED,PRIO --bytes --noheadings --raw`.
///
/// Format: `/dev/zram0 partition 536870912 0 100`. Malformed lines are skipped.
pub fn parse_swapon(content: &str) -> Vec<SwapArea> {
    content
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 5 {
                return None;
            }
            Some(SwapArea {
                name: parts[0].to_string(),
                kind: parts[1].to_string(),
                size: parts[2].parse().ok()?,
                used: parts[3].parse().ok()?,
                priority: parts[4].parse().ok()?,
            })
        })
        .collect()
}
