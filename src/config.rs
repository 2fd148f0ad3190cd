//! Typed settings and the persisted device list.
//!
//! Settings live in a flat `key="value"` file. That format is private to
//! [`IniConfigStore`]; the rest of the crate only sees [`Settings`] through
//! the [`ConfigStore`] trait.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::warn;

use crate::collector::kernel_name;
use crate::error::{Result, ZramError};
use crate::fmt::MIB;
use crate::util::write_atomic;

/// Default settings file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/zramkit/settings.ini";

/// One persisted device: enough to re-create it after a reboot.
///
/// Token format: `size:algorithm[:priority][@device]`, e.g. `512M:lz4`,
/// `1G:zstd:50@zram1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfigEntry {
    /// Size exactly as requested (`512M`).
    pub size: String,
    pub algorithm: String,
    pub priority: Option<i32>,
    /// Kernel name of the device this entry was created as (`zram0`).
    /// Absent in lists written before entries were keyed by device.
    pub device: Option<String>,
}

impl DeviceConfigEntry {
    pub fn new(size: impl Into<String>, algorithm: impl Into<String>) -> Self {
        Self {
            size: size.into(),
            algorithm: algorithm.into(),
            priority: None,
            device: None,
        }
    }

    pub fn with_device(mut self, device: &str) -> Self {
        self.device = Some(kernel_name(device).to_string());
        self
    }

    /// Whether this entry is keyed to `device` (`zram0` or `/dev/zram0`).
    pub fn is_for(&self, device: &str) -> bool {
        self.device.as_deref() == Some(kernel_name(device))
    }
}

impl fmt::Display for DeviceConfigEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.size, self.algorithm)?;
        if let Some(prio) = self.priority {
            write!(f, ":{}", prio)?;
        }
        if let Some(device) = &self.device {
            write!(f, "@{}", device)?;
        }
        Ok(())
    }
}

impl FromStr for DeviceConfigEntry {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (head, device) = match s.rsplit_once('@') {
            Some((head, device)) if !device.is_empty() => (head, Some(device.to_string())),
            Some(_) => return Err(format!("empty device in '{}'", s)),
            None => (s, None),
        };

        let parts: Vec<&str> = head.split(':').collect();
        let (size, algorithm, priority) = match parts.as_slice() {
            [size, algo] => (*size, *algo, None),
            [size, algo, prio] => {
                let prio = prio
                    .parse::<i32>()
                    .map_err(|_| format!("invalid priority in '{}'", s))?;
                (*size, *algo, Some(prio))
            }
            _ => return Err(format!("expected size:algorithm[:priority], got '{}'", s)),
        };
        if size.is_empty() || algorithm.is_empty() {
            return Err(format!("empty size or algorithm in '{}'", s));
        }

        Ok(Self {
            size: size.to_string(),
            algorithm: algorithm.to_string(),
            priority,
            device,
        })
    }
}

/// Parses a comma-separated device list, skipping (and logging) bad tokens.
pub fn parse_device_list(value: &str) -> Vec<DeviceConfigEntry> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(|token| match token.parse() {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(token, error = %e, "ignoring malformed device entry");
                None
            }
        })
        .collect()
}

pub fn format_device_list(entries: &[DeviceConfigEntry]) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// All zramkit settings with their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Dashboard widget enabled.
    pub enabled: bool,
    /// Dashboard polling interval in milliseconds.
    pub refresh_interval_ms: u64,
    /// Devices to re-create at boot, in creation order.
    pub devices: Vec<DeviceConfigEntry>,
    /// Size used by `create` when none is given.
    pub swap_size: String,
    /// Algorithm used by `create` when none is given.
    pub compression_algo: String,
    /// Verbose collector logging.
    pub debug: bool,
    /// Seconds between collector samples.
    pub collector_interval_secs: u64,
    /// History capacity (samples).
    pub history_points: usize,
    /// Headroom the safety check keeps free, in MiB.
    pub safety_buffer_mb: u64,
    /// Priority given to freshly created devices.
    pub default_priority: i32,
    /// Hard timeout for every external tool invocation.
    pub command_timeout_ms: u64,
    /// Keys zramkit does not know about, preserved verbatim.
    pub extra: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_interval_ms: 3000,
            devices: Vec::new(),
            swap_size: "1G".to_string(),
            compression_algo: "zstd".to_string(),
            debug: false,
            collector_interval_secs: 12,
            history_points: 300,
            safety_buffer_mb: 100,
            default_priority: 100,
            command_timeout_ms: 5000,
            extra: BTreeMap::new(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" | "on" => Some(true),
        "no" | "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn yes_no(value: bool) -> String {
    let s = if value { "yes" } else { "no" };
    s.to_string()
}

impl Settings {
    /// Builds settings from raw key/value pairs, falling back to the default
    /// for every missing or unparseable known key.
    pub fn merge_over_defaults(raw: &BTreeMap<String, String>) -> Self {
        let mut settings = Self::default();

        fn set<T: FromStr>(target: &mut T, key: &str, value: &str) {
            match value.trim().parse() {
                Ok(v) => *target = v,
                Err(_) => warn!(key, value, "invalid setting, keeping default"),
            }
        }

        for (key, value) in raw {
            match key.as_str() {
                "enabled" => match parse_bool(value) {
                    Some(v) => settings.enabled = v,
                    None => warn!(key = %key, value = %value, "invalid setting, keeping default"),
                },
                "debug" => match parse_bool(value) {
                    Some(v) => settings.debug = v,
                    None => warn!(key = %key, value = %value, "invalid setting, keeping default"),
                },
                "refresh_interval" => set(&mut settings.refresh_interval_ms, key, value),
                "zram_devices" => settings.devices = parse_device_list(value),
                "swap_size" if !value.trim().is_empty() => {
                    settings.swap_size = value.trim().to_string()
                }
                "compression_algo" if !value.trim().is_empty() => {
                    settings.compression_algo = value.trim().to_string()
                }
                "collector_interval" => set(&mut settings.collector_interval_secs, key, value),
                "history_points" => set(&mut settings.history_points, key, value),
                "safety_buffer_mb" => set(&mut settings.safety_buffer_mb, key, value),
                "default_priority" => set(&mut settings.default_priority, key, value),
                "command_timeout_ms" => set(&mut settings.command_timeout_ms, key, value),
                "swap_size" | "compression_algo" => {}
                _ => {
                    settings.extra.insert(key.clone(), value.clone());
                }
            }
        }

        settings
    }

    /// Flattens settings back to key/value pairs, known keys first.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("enabled".to_string(), yes_no(self.enabled)),
            (
                "refresh_interval".to_string(),
                self.refresh_interval_ms.to_string(),
            ),
            (
                "zram_devices".to_string(),
                format_device_list(&self.devices),
            ),
            ("swap_size".to_string(), self.swap_size.clone()),
            ("compression_algo".to_string(), self.compression_algo.clone()),
            ("debug".to_string(), yes_no(self.debug)),
            (
                "collector_interval".to_string(),
                self.collector_interval_secs.to_string(),
            ),
            (
                "history_points".to_string(),
                self.history_points.to_string(),
            ),
            (
                "safety_buffer_mb".to_string(),
                self.safety_buffer_mb.to_string(),
            ),
            (
                "default_priority".to_string(),
                self.default_priority.to_string(),
            ),
            (
                "command_timeout_ms".to_string(),
                self.command_timeout_ms.to_string(),
            ),
        ];
        pairs.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms.max(1))
    }

    pub fn collector_interval(&self) -> Duration {
        Duration::from_secs(self.collector_interval_secs.max(1))
    }

    pub fn safety_buffer_bytes(&self) -> u64 {
        self.safety_buffer_mb.saturating_mul(MIB)
    }

    /// Drops the persisted entry for a removed device.
    ///
    /// Entries are matched by device name. Entries written before entries
    /// were keyed carry no names; when no keyed entry matches, the last
    /// unkeyed one is dropped, which is only right when devices are removed
    /// in reverse creation order.
    pub fn forget_device(&mut self, device: &str) -> Option<DeviceConfigEntry> {
        if let Some(idx) = self.devices.iter().position(|e| e.is_for(device)) {
            return Some(self.devices.remove(idx));
        }
        match self.devices.iter().rposition(|e| e.device.is_none()) {
            Some(idx) => {
                warn!(device, "no keyed entry for removed device, dropped last unkeyed entry");
                Some(self.devices.remove(idx))
            }
            None => {
                warn!(device, "no persisted entry for removed device");
                None
            }
        }
    }

    /// Records a new priority for `device`.
    ///
    /// `live_index` is the device's position among live devices, used for
    /// unkeyed lists. Returns whether an entry was updated.
    pub fn set_device_priority(
        &mut self,
        device: &str,
        live_index: Option<usize>,
        priority: i32,
    ) -> bool {
        let idx = match self.devices.iter().position(|e| e.is_for(device)) {
            Some(idx) => Some(idx),
            None if self.devices.iter().all(|e| e.device.is_none()) => {
                live_index.filter(|i| *i < self.devices.len())
            }
            None => None,
        };

        match idx {
            Some(idx) => {
                self.devices[idx].priority = Some(priority);
                true
            }
            None => {
                warn!(device, "no persisted entry to update priority");
                false
            }
        }
    }
}

/// Parses `key="value"` lines. Blank lines and `;`/`#` comments are ignored.
pub fn parse_ini(content: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') || line.starts_with('[')
        {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        map.insert(key.trim().to_string(), value.to_string());
    }
    map
}

pub fn render_ini(pairs: &[(String, String)]) -> String {
    let mut out = pairs
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v))
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

/// Where settings are loaded from and saved to.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<Settings>;
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// Settings in a flat `key="value"` file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct IniConfigStore {
    path: PathBuf,
}

impl IniConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl ConfigStore for IniConfigStore {
    /// A missing file yields the defaults.
    fn load(&self) -> Result<Settings> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Settings::merge_over_defaults(&parse_ini(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(ZramError::Config(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let content = render_ini(&settings.to_pairs());
        write_atomic(&self.path, content.as_bytes())
            .map_err(|e| ZramError::Config(format!("{}: {}", self.path.display(), e)))
    }
}

/// In-memory store; clones share the same settings.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    inner: Arc<Mutex<(Settings, usize)>>,
}

impl MemoryConfigStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(Mutex::new((settings, 0))),
        }
    }

    /// Current settings.
    pub fn settings(&self) -> Settings {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).0.clone()
    }

    /// Number of saves so far.
    pub fn saves(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).1
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Settings> {
        Ok(self.settings())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.0 = settings.clone();
        inner.1 += 1;
        Ok(())
    }
}
