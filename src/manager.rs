//! Device Lifecycle Manager: create, remove, re-prioritise and restore zram swaps.
//!
//! A device moves through `absent -> sized -> formatted -> active -> absent`.
//! Every transition is an external tool call; the kernel serialises them, so
//! the manager holds no lock of its own. Anything that takes a device offline
//! is gated by the [`SafetyEvaluator`].

use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::collector::parser::parse_zramctl_find;
use crate::collector::{
    CommandOutput, CommandRunner, DeviceInventory, FileSystem, SystemMemory, device_path,
};
use crate::config::{ConfigStore, DeviceConfigEntry, Settings};
use crate::error::{ProvisionStep, Result, ZramError};
use crate::fmt::parse_size;
use crate::safety::{SafetyEvaluator, SafetyVerdict, Target};

pub const MIN_PRIORITY: i32 = -1;
pub const MAX_PRIORITY: i32 = 32767;
pub const DEFAULT_PRIORITY: i32 = 100;

/// Clamps a requested swap priority to what `swapon` accepts.
pub fn clamp_priority(priority: i64) -> i32 {
    priority.clamp(MIN_PRIORITY as i64, MAX_PRIORITY as i64) as i32
}

/// Transcript of the commands run for one operation, returned to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpLog {
    lines: Vec<String>,
}

impl OpLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn command(&mut self, command_line: &str, result: &std::io::Result<CommandOutput>) {
        self.lines.push(format!("$ {}", command_line));
        match result {
            Ok(output) => {
                for line in output.stdout.lines().chain(output.stderr.lines()) {
                    if !line.trim().is_empty() {
                        self.lines.push(line.to_string());
                    }
                }
                if !output.success() {
                    self.lines.push(format!("({})", output.describe_failure()));
                }
            }
            Err(e) => self.lines.push(format!("({})", e)),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Algorithm names are passed straight to the kernel; keep them to the
/// character set kernel crypto names use.
fn validate_algorithm(algorithm: &str) -> Result<()> {
    let valid = !algorithm.is_empty()
        && algorithm.len() <= 64
        && algorithm
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ZramError::InvalidArgument(format!(
            "invalid compression algorithm '{}'",
            algorithm
        )))
    }
}

fn validate_size(size: &str) -> Result<()> {
    match parse_size(size) {
        Ok(0) => Err(ZramError::InvalidArgument("size must be non-zero".into())),
        Ok(_) => Ok(()),
        Err(e) => Err(ZramError::InvalidArgument(e)),
    }
}

/// Creates, removes and re-prioritises zram swap devices.
pub struct DeviceManager<R, F, S>
where
    R: CommandRunner + Clone,
    F: FileSystem + Clone,
    S: ConfigStore,
{
    runner: R,
    fs: F,
    inventory: DeviceInventory<R, F>,
    safety: SafetyEvaluator<R, F>,
    store: S,
    sys_path: String,
    default_priority: i32,
}

impl<R, F, S> DeviceManager<R, F, S>
where
    R: CommandRunner + Clone,
    F: FileSystem + Clone,
    S: ConfigStore,
{
    /// Creates a manager reading the standard `/sys` and `/proc` locations.
    pub fn new(runner: R, fs: F, store: S) -> Self {
        Self::with_paths(runner, fs, store, "/sys", "/proc")
    }

    pub fn with_paths(runner: R, fs: F, store: S, sys_path: &str, proc_path: &str) -> Self {
        let inventory = DeviceInventory::new(runner.clone(), fs.clone(), sys_path);
        let safety = SafetyEvaluator::new(
            inventory.clone(),
            SystemMemory::new(fs.clone(), proc_path),
        );
        Self {
            runner,
            fs,
            inventory,
            safety,
            store,
            sys_path: sys_path.to_string(),
            default_priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_safety_buffer(mut self, buffer: u64) -> Self {
        self.safety = self.safety.with_buffer(buffer);
        self
    }

    pub fn with_default_priority(mut self, priority: i32) -> Self {
        self.default_priority = clamp_priority(priority as i64);
        self
    }

    /// Applies the default priority and safety buffer from `settings`.
    pub fn configured(self, settings: &Settings) -> Self {
        self.with_default_priority(settings.default_priority)
            .with_safety_buffer(settings.safety_buffer_bytes())
    }

    fn exec(&self, log: &mut OpLog, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
        let command_line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        let result = self.runner.run(program, args);
        debug!(command = %command_line, ok = matches!(&result, Ok(o) if o.success()), "command finished");
        log.command(&command_line, &result);
        result
    }

    /// Runs a command and maps spawn failures, timeouts and non-zero exits to a message.
    fn exec_checked(
        &self,
        log: &mut OpLog,
        program: &str,
        args: &[&str],
    ) -> std::result::Result<CommandOutput, String> {
        match self.exec(log, program, args) {
            Ok(output) if output.success() => Ok(output),
            Ok(output) => Err(format!("{}: {}", program, output.describe_failure())),
            Err(e) => Err(format!("{}: {}", program, e)),
        }
    }

    fn ensure_module(&self, log: &mut OpLog) -> Result<()> {
        let module = Path::new(&self.sys_path).join("module").join("zram");
        if self.fs.exists(&module) {
            return Ok(());
        }
        self.exec_checked(log, "modprobe", &["zram"])
            .map(|_| ())
            .map_err(|message| ZramError::Provisioning {
                step: ProvisionStep::ModuleLoad,
                message,
            })
    }

    /// Runs the create sequence and returns the new device path.
    fn provision(&self, size: &str, algorithm: &str, priority: i32, log: &mut OpLog) -> Result<String> {
        validate_size(size)?;
        validate_algorithm(algorithm)?;
        self.ensure_module(log)?;

        let found = self
            .exec_checked(log, "zramctl", &["--find"])
            .map_err(|message| ZramError::Provisioning {
                step: ProvisionStep::FindDevice,
                message,
            })?;
        let device = parse_zramctl_find(&found.stdout).ok_or_else(|| ZramError::Provisioning {
            step: ProvisionStep::FindDevice,
            message: "zramctl --find returned no device".into(),
        })?;

        let fail = |step: ProvisionStep, message: String| {
            error!(device = %device, step = %step, message = %message, "provisioning failed");
            ZramError::Provisioning {
                step,
                message: format!(
                    "{} ({} may remain allocated; remove it to clean up)",
                    message, device
                ),
            }
        };

        // The algorithm can only change while the device holds no data, so it
        // goes in before the size initialises the device.
        self.exec_checked(log, "zramctl", &["--algorithm", algorithm, device.as_str()])
            .map_err(|m| fail(ProvisionStep::Algorithm, m))?;
        self.exec_checked(log, "zramctl", &["--size", size, device.as_str()])
            .map_err(|m| fail(ProvisionStep::Size, m))?;
        self.exec_checked(log, "mkswap", &[device.as_str()])
            .map_err(|m| fail(ProvisionStep::Format, m))?;
        self.swapon(log, &device, priority)
            .map_err(|m| fail(ProvisionStep::Activate, m))?;

        Ok(device)
    }

    fn swapon(&self, log: &mut OpLog, device: &str, priority: i32) -> std::result::Result<(), String> {
        let prio = priority.to_string();
        let args: Vec<&str> = if priority == MIN_PRIORITY {
            vec![device]
        } else {
            vec!["-p", prio.as_str(), device]
        };
        self.exec_checked(log, "swapon", &args).map(|_| ())
    }

    /// Creates and activates a new zram swap device.
    pub fn create(&self, size: &str, algorithm: &str, log: &mut OpLog) -> Result<String> {
        let device = self.provision(size, algorithm, self.default_priority, log)?;

        let mut settings = self.store.load()?;
        settings
            .devices
            .push(DeviceConfigEntry::new(size, algorithm).with_device(&device));
        self.store.save(&settings)?;

        info!(device = %device, size, algorithm, "zram device created");
        Ok(device)
    }

    /// Whether `device` is currently an active swap area. Unknown counts as active.
    fn is_active_swap(&self, device: &str) -> bool {
        match self.inventory.swap_areas() {
            Ok(areas) => areas.iter().any(|a| a.name == device),
            Err(e) => {
                debug!(error = %e, "swap areas unknown, assuming device is active");
                true
            }
        }
    }

    fn deactivate(&self, log: &mut OpLog, device: &str) -> Result<()> {
        if !self.is_active_swap(device) {
            log.note(format!("{} is not an active swap area", device));
            return Ok(());
        }
        self.exec_checked(log, "swapoff", &[device])
            .map(|_| ())
            .map_err(|message| {
                warn!(device, message = %message, "swapoff failed");
                ZramError::Deactivation {
                    device: device.to_string(),
                    message,
                }
            })
    }

    /// Evacuates and releases the targeted devices.
    ///
    /// Nothing is touched when the safety check fails. A failed `swapoff`
    /// stops the operation before that device is reset.
    pub fn remove(&self, target: &Target, log: &mut OpLog) -> Result<Vec<String>> {
        // Live devices at call time, never the persisted list.
        let live = self.inventory.list_devices()?;
        let (targets, verdict) = match target {
            Target::All => (
                live.into_iter().map(|d| d.name).collect::<Vec<_>>(),
                self.safety.evaluate(target)?,
            ),
            Target::Device(name) => {
                let path = device_path(name);
                if !live.iter().any(|d| d.name == path) {
                    return Err(ZramError::DeviceNotFound(path));
                }
                let verdict = self.safety.evaluate_device(&path)?;
                (vec![path], verdict)
            }
        };
        if !verdict.safe {
            let reason = verdict.reason.unwrap_or_default();
            warn!(target = %target, reason = %reason, "removal blocked");
            return Err(ZramError::UnsafeRemoval { reason });
        }

        let mut removed = Vec::with_capacity(targets.len());
        let mut failure = None;
        for device in &targets {
            if let Err(e) = self.deactivate(log, device) {
                failure = Some(e);
                break;
            }
            if let Err(message) = self.exec_checked(log, "zramctl", &["--reset", device]) {
                failure = Some(ZramError::Deactivation {
                    device: device.clone(),
                    message: format!("swap is off but reset failed: {}", message),
                });
                break;
            }
            info!(device = %device, "zram device removed");
            removed.push(device.clone());
        }

        if failure.is_none() || !removed.is_empty() {
            let mut settings = self.store.load()?;
            if failure.is_none() && *target == Target::All {
                settings.devices.clear();
            } else {
                for device in &removed {
                    settings.forget_device(device);
                }
            }
            self.store.save(&settings)?;
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Re-attaches `device` with a new swap priority; returns the applied priority.
    pub fn set_priority(&self, device: &str, priority: i64, log: &mut OpLog) -> Result<i32> {
        let priority = clamp_priority(priority);
        let path = device_path(device);

        let live = self.inventory.list_devices()?;
        let Some(index) = live.iter().position(|d| d.name == path) else {
            return Err(ZramError::DeviceNotFound(path));
        };

        // swapoff evacuates the device exactly like a removal does.
        let verdict = self.safety.evaluate_device(&path)?;
        if !verdict.safe {
            return Err(ZramError::UnsafeRemoval {
                reason: verdict.reason.unwrap_or_default(),
            });
        }

        self.deactivate(log, &path)?;
        if let Err(message) = self.swapon(log, &path, priority) {
            error!(device = %path, message = %message, "device is offline after failed reactivation");
            return Err(ZramError::Reactivation {
                device: path,
                message,
            });
        }

        let mut settings = self.store.load()?;
        if settings.set_device_priority(&path, Some(index), priority) {
            self.store.save(&settings)?;
        }

        info!(device = %path, priority, "swap priority updated");
        Ok(priority)
    }

    /// Re-creates every persisted device that is not already live.
    ///
    /// Keyed entries are live when their device is. Unkeyed entries are
    /// paired in order with the live devices no keyed entry claims, and take
    /// those names. Entries are re-keyed with the names the kernel hands out;
    /// entries that fail to provision stay in the list for the next attempt.
    pub fn restore(&self, log: &mut OpLog) -> Result<Vec<String>> {
        let mut settings = self.store.load()?;
        if settings.devices.is_empty() {
            return Ok(Vec::new());
        }

        let live: Vec<String> = match self.inventory.list_devices() {
            Ok(devices) => devices.into_iter().map(|d| d.name).collect(),
            Err(e) => {
                debug!(error = %e, "no device listing, assuming none are live");
                Vec::new()
            }
        };

        let unclaimed: Vec<String> = live
            .iter()
            .filter(|name| !settings.devices.iter().any(|e| e.is_for(name)))
            .cloned()
            .collect();
        let mut unclaimed = unclaimed.into_iter();

        let mut created = Vec::new();
        let mut first_error = None;
        let mut entries = Vec::with_capacity(settings.devices.len());
        for entry in std::mem::take(&mut settings.devices) {
            if live.iter().any(|name| entry.is_for(name)) {
                entries.push(entry);
                continue;
            }
            if entry.device.is_none()
                && let Some(name) = unclaimed.next()
            {
                debug!(device = %name, entry = %entry, "unkeyed entry already live");
                log.note(format!("{} is already live as {}", entry, name));
                entries.push(entry.with_device(&name));
                continue;
            }
            let priority = entry.priority.unwrap_or(self.default_priority);
            match self.provision(&entry.size, &entry.algorithm, priority, log) {
                Ok(device) => {
                    info!(device = %device, entry = %entry, "zram device restored");
                    created.push(device.clone());
                    entries.push(entry.with_device(&device));
                }
                Err(e) => {
                    error!(entry = %entry, error = %e, "failed to restore device");
                    log.note(format!("{}: {}", entry, e));
                    entries.push(entry);
                    first_error.get_or_insert(e);
                }
            }
        }

        settings.devices = entries;
        self.store.save(&settings)?;

        match first_error {
            Some(e) if created.is_empty() => Err(e),
            _ => Ok(created),
        }
    }

    /// Safety verdict for `target` without acting on it.
    pub fn check_safety(&self, target: &Target) -> Result<SafetyVerdict> {
        self.safety.evaluate(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, MockRunner, scenarios};
    use crate::config::{MemoryConfigStore, Settings, format_device_list, parse_device_list};
    use crate::fmt::MIB;

    fn manager(
        runner: &MockRunner,
        fs: MockFs,
        store: &MemoryConfigStore,
    ) -> DeviceManager<MockRunner, MockFs, MemoryConfigStore> {
        DeviceManager::new(runner.clone(), fs, store.clone())
    }

    fn script_provision(runner: &MockRunner, device: &str, size: &str, algo: &str) {
        runner.on("zramctl --find", CommandOutput::ok(format!("{}\n", device)));
        runner.on(
            &format!("zramctl --algorithm {} {}", algo, device),
            CommandOutput::ok(""),
        );
        runner.on(
            &format!("zramctl --size {} {}", size, device),
            CommandOutput::ok(""),
        );
        runner.on(
            &format!("mkswap {}", device),
            CommandOutput::ok("Setting up swapspace version 1, size = 512 MiB\n"),
        );
    }

    fn settings_with(devices: &str) -> Settings {
        Settings {
            devices: parse_device_list(devices),
            ..Settings::default()
        }
    }

    #[test]
    fn test_create_on_free_device() {
        let (runner, fs) = scenarios::empty_host();
        script_provision(&runner, "/dev/zram0", "512M", "lz4");
        runner.on("swapon -p 100 /dev/zram0", CommandOutput::ok(""));
        let store = MemoryConfigStore::default();

        let mut log = OpLog::new();
        let device = manager(&runner, fs, &store)
            .create("512M", "lz4", &mut log)
            .unwrap();

        assert_eq!(device, "/dev/zram0");
        assert_eq!(
            runner.calls(),
            vec![
                "zramctl --find",
                "zramctl --algorithm lz4 /dev/zram0",
                "zramctl --size 512M /dev/zram0",
                "mkswap /dev/zram0",
                "swapon -p 100 /dev/zram0",
            ]
        );
        let devices = store.settings().devices;
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].size, "512M");
        assert_eq!(devices[0].algorithm, "lz4");
        assert_eq!(devices[0].priority, None);
        assert!(devices[0].is_for("zram0"));
        assert!(log.lines().iter().any(|l| l == "$ mkswap /dev/zram0"));
    }

    #[test]
    fn test_create_loads_module_when_missing() {
        let (runner, _) = scenarios::empty_host();
        let mut fs = MockFs::new();
        fs.add_meminfo(scenarios::AVAILABLE_KB);
        script_provision(&runner, "/dev/zram0", "1G", "zstd");
        runner.on("swapon -p 100 /dev/zram0", CommandOutput::ok(""));
        runner.on("modprobe zram", CommandOutput::ok(""));
        let store = MemoryConfigStore::default();

        manager(&runner, fs, &store)
            .create("1G", "zstd", &mut OpLog::new())
            .unwrap();
        assert_eq!(runner.calls()[0], "modprobe zram");
    }

    #[test]
    fn test_create_activation_failure_reports_step() {
        let (runner, fs) = scenarios::empty_host();
        script_provision(&runner, "/dev/zram0", "512M", "lz4");
        runner.on(
            "swapon -p 100 /dev/zram0",
            CommandOutput::failed(255, "swapon: /dev/zram0: swapon failed: Device or resource busy"),
        );
        let store = MemoryConfigStore::default();

        let err = manager(&runner, fs, &store)
            .create("512M", "lz4", &mut OpLog::new())
            .unwrap_err();
        match err {
            ZramError::Provisioning { step, message } => {
                assert_eq!(step, ProvisionStep::Activate);
                assert!(message.contains("may remain allocated"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(store.settings().devices.is_empty());
        assert_eq!(store.saves(), 0);
    }

    #[test]
    fn test_create_without_free_device() {
        let (runner, fs) = scenarios::empty_host();
        runner.on(
            "zramctl --find",
            CommandOutput::failed(1, "zramctl: no free zram device found"),
        );
        let store = MemoryConfigStore::default();

        let err = manager(&runner, fs, &store)
            .create("512M", "lz4", &mut OpLog::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ZramError::Provisioning {
                step: ProvisionStep::FindDevice,
                ..
            }
        ));
    }

    #[test]
    fn test_create_rejects_bad_arguments_before_any_command() {
        let (runner, fs) = scenarios::empty_host();
        let store = MemoryConfigStore::default();
        let mgr = manager(&runner, fs, &store);

        assert!(matches!(
            mgr.create("huge", "lz4", &mut OpLog::new()),
            Err(ZramError::InvalidArgument(_))
        ));
        assert!(matches!(
            mgr.create("512M", "lz4; reboot", &mut OpLog::new()),
            Err(ZramError::InvalidArgument(_))
        ));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_remove_all_blocked_when_unsafe() {
        let (runner, mut fs) = scenarios::two_devices();
        // 150 MiB to evacuate, 100 MiB available + 1536 MiB swap file, buffer 1600 MiB
        fs.add_meminfo(100 * 1024);
        let store = MemoryConfigStore::new(settings_with("512M:lz4@zram0,1G:zstd@zram1"));
        let mgr = manager(&runner, fs, &store).with_safety_buffer(1600 * MIB);

        let err = mgr.remove(&Target::All, &mut OpLog::new()).unwrap_err();
        match err {
            ZramError::UnsafeRemoval { reason } => assert!(reason.contains("short by")),
            other => panic!("unexpected error: {}", other),
        }
        assert!(runner.calls_to("swapoff").is_empty());
        assert!(
            !runner
                .calls()
                .iter()
                .any(|c| c.starts_with("zramctl --reset"))
        );
        assert_eq!(store.saves(), 0);
        assert_eq!(store.settings().devices.len(), 2);
    }

    #[test]
    fn test_remove_all_enumerates_live_devices() {
        let (runner, fs) = scenarios::two_devices();
        for dev in ["/dev/zram0", "/dev/zram1"] {
            runner.on(&format!("swapoff {}", dev), CommandOutput::ok(""));
            runner.on(&format!("zramctl --reset {}", dev), CommandOutput::ok(""));
        }
        // stale persisted entry for a device that no longer exists
        let store = MemoryConfigStore::new(settings_with("512M:lz4@zram0,1G:zstd@zram1,2G:lz4@zram2"));

        let removed = manager(&runner, fs, &store)
            .remove(&Target::All, &mut OpLog::new())
            .unwrap();

        assert_eq!(removed, vec!["/dev/zram0", "/dev/zram1"]);
        assert!(!runner.calls().iter().any(|c| c.contains("zram2")));
        assert!(store.settings().devices.is_empty());
    }

    #[test]
    fn test_remove_single_device_forgets_its_entry() {
        let (runner, fs) = scenarios::two_devices();
        runner.on("swapoff /dev/zram0", CommandOutput::ok(""));
        runner.on("zramctl --reset /dev/zram0", CommandOutput::ok(""));
        let store = MemoryConfigStore::new(settings_with("512M:lz4@zram0,1G:zstd@zram1"));

        manager(&runner, fs, &store)
            .remove(&Target::parse("zram0"), &mut OpLog::new())
            .unwrap();

        let devices = store.settings().devices;
        assert_eq!(devices.len(), 1);
        assert!(devices[0].is_for("zram1"));
    }

    #[test]
    fn test_remove_unknown_device() {
        let (runner, fs) = scenarios::two_devices();
        let store = MemoryConfigStore::default();
        let err = manager(&runner, fs, &store)
            .remove(&Target::parse("zram9"), &mut OpLog::new())
            .unwrap_err();
        assert!(matches!(err, ZramError::DeviceNotFound(_)));
        assert!(runner.calls_to("swapoff").is_empty());
    }

    #[test]
    fn test_remove_busy_device_skips_reset() {
        let (runner, fs) = scenarios::two_devices();
        runner.on(
            "swapoff /dev/zram1",
            CommandOutput::failed(255, "swapoff: /dev/zram1: swapoff failed: Cannot allocate memory"),
        );
        let store = MemoryConfigStore::new(settings_with("512M:lz4@zram0,1G:zstd@zram1"));

        let err = manager(&runner, fs, &store)
            .remove(&Target::parse("/dev/zram1"), &mut OpLog::new())
            .unwrap_err();

        assert!(matches!(err, ZramError::Deactivation { .. }));
        assert!(
            !runner
                .calls()
                .iter()
                .any(|c| c.starts_with("zramctl --reset"))
        );
        assert_eq!(store.saves(), 0);
    }

    #[test]
    fn test_remove_inactive_device_skips_swapoff() {
        let (_, fs) = scenarios::two_devices();
        let runner = MockRunner::new();
        runner.on(
            scenarios::ZRAMCTL_JSON,
            CommandOutput::ok(scenarios::TWO_DEVICES_JSON),
        );
        runner.on(
            scenarios::SWAPON_SHOW,
            CommandOutput::ok("/swapfile file 2147483648 536870912 -2\n"),
        );
        runner.on("zramctl --reset /dev/zram1", CommandOutput::ok(""));
        let store = MemoryConfigStore::new(settings_with("512M:lz4,1G:zstd"));

        manager(&runner, fs, &store)
            .remove(&Target::parse("zram1"), &mut OpLog::new())
            .unwrap();

        assert!(runner.calls_to("swapoff").is_empty());
        // unkeyed list: the last entry goes
        assert_eq!(store.settings().devices, parse_device_list("512M:lz4"));
    }

    #[test]
    fn test_set_priority_clamps_and_persists() {
        let (runner, fs) = scenarios::two_devices();
        runner.on("swapoff /dev/zram1", CommandOutput::ok(""));
        runner.on("swapon -p 32767 /dev/zram1", CommandOutput::ok(""));
        let store = MemoryConfigStore::new(settings_with("512M:lz4@zram0,1G:zstd@zram1"));

        let applied = manager(&runner, fs, &store)
            .set_priority("zram1", 99999, &mut OpLog::new())
            .unwrap();

        assert_eq!(applied, MAX_PRIORITY);
        assert_eq!(store.settings().devices[1].priority, Some(MAX_PRIORITY));
    }

    #[test]
    fn test_set_priority_auto_omits_flag() {
        let (runner, fs) = scenarios::two_devices();
        runner.on("swapoff /dev/zram0", CommandOutput::ok(""));
        runner.on("swapon /dev/zram0", CommandOutput::ok(""));
        let store = MemoryConfigStore::new(settings_with("512M:lz4@zram0"));

        let applied = manager(&runner, fs, &store)
            .set_priority("/dev/zram0", -50, &mut OpLog::new())
            .unwrap();
        assert_eq!(applied, -1);
        assert!(runner.calls().iter().any(|c| c == "swapon /dev/zram0"));
    }

    #[test]
    fn test_set_priority_reactivation_failure_is_critical() {
        let (runner, fs) = scenarios::two_devices();
        runner.on("swapoff /dev/zram0", CommandOutput::ok(""));
        runner.on(
            "swapon -p 5 /dev/zram0",
            CommandOutput::failed(255, "swapon: /dev/zram0: read swap header failed"),
        );
        let store = MemoryConfigStore::new(settings_with("512M:lz4@zram0"));

        let err = manager(&runner, fs, &store)
            .set_priority("zram0", 5, &mut OpLog::new())
            .unwrap_err();
        assert!(err.is_critical());
        assert_eq!(store.settings().devices[0].priority, None);
    }

    #[test]
    fn test_set_priority_blocked_when_unsafe() {
        let (runner, mut fs) = scenarios::two_devices();
        fs.add_meminfo(0);
        let store = MemoryConfigStore::default();
        let err = manager(&runner, fs, &store)
            .with_safety_buffer(2000 * MIB)
            .set_priority("zram0", 10, &mut OpLog::new())
            .unwrap_err();
        assert!(matches!(err, ZramError::UnsafeRemoval { .. }));
        assert!(runner.calls_to("swapoff").is_empty());
    }

    #[test]
    fn test_restore_recreates_missing_devices() {
        let (runner, fs) = scenarios::empty_host();
        script_provision(&runner, "/dev/zram0", "512M", "lz4");
        runner.on("swapon -p 100 /dev/zram0", CommandOutput::ok(""));
        runner.on("zramctl --find", CommandOutput::ok("/dev/zram1\n"));
        runner.on("zramctl --algorithm zstd /dev/zram1", CommandOutput::ok(""));
        runner.on("zramctl --size 1G /dev/zram1", CommandOutput::ok(""));
        runner.on("mkswap /dev/zram1", CommandOutput::ok(""));
        runner.on("swapon -p 20 /dev/zram1", CommandOutput::ok(""));
        let store = MemoryConfigStore::new(settings_with("512M:lz4@zram3,1G:zstd:20"));

        let created = manager(&runner, fs, &store)
            .restore(&mut OpLog::new())
            .unwrap();

        assert_eq!(created, vec!["/dev/zram0", "/dev/zram1"]);
        let devices = store.settings().devices;
        assert_eq!(
            devices.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["512M:lz4@zram0", "1G:zstd:20@zram1"]
        );
    }

    #[test]
    fn test_restore_pairs_unkeyed_entries_with_live_devices() {
        let (runner, fs) = scenarios::two_devices();
        let store = MemoryConfigStore::new(settings_with("512M:lz4,1G:zstd"));

        let created = manager(&runner, fs, &store)
            .restore(&mut OpLog::new())
            .unwrap();

        assert!(created.is_empty());
        assert!(!runner.calls().iter().any(|c| c == "zramctl --find"));
        assert!(runner.calls_to("swapon").iter().all(|c| c.starts_with("swapon --show")));
        assert_eq!(
            format_device_list(&store.settings().devices),
            "512M:lz4@zram0,1G:zstd@zram1"
        );
    }

    #[test]
    fn test_restore_mixed_list_provisions_only_missing_keyed_entry() {
        let (runner, fs) = scenarios::two_devices();
        script_provision(&runner, "/dev/zram2", "2G", "lz4");
        runner.on("swapon -p 100 /dev/zram2", CommandOutput::ok(""));
        let store = MemoryConfigStore::new(settings_with("512M:lz4,1G:zstd@zram1,2G:lz4@zram5"));

        let created = manager(&runner, fs, &store)
            .restore(&mut OpLog::new())
            .unwrap();

        assert_eq!(created, vec!["/dev/zram2"]);
        assert_eq!(runner.calls_to("mkswap"), vec!["mkswap /dev/zram2"]);
        assert_eq!(
            format_device_list(&store.settings().devices),
            "512M:lz4@zram0,1G:zstd@zram1,2G:lz4@zram2"
        );
    }

    #[test]
    fn test_remove_with_mixed_list_drops_unkeyed_entry() {
        let (runner, fs) = scenarios::two_devices();
        runner.on("swapoff /dev/zram0", CommandOutput::ok(""));
        runner.on("zramctl --reset /dev/zram0", CommandOutput::ok(""));
        let store = MemoryConfigStore::new(settings_with("512M:lz4,1G:zstd@zram1"));

        manager(&runner, fs, &store)
            .remove(&Target::parse("zram0"), &mut OpLog::new())
            .unwrap();

        assert_eq!(
            format_device_list(&store.settings().devices),
            "1G:zstd@zram1"
        );
    }

    #[test]
    fn test_single_device_safety_ignores_longer_names() {
        let (_, fs) = scenarios::two_devices();
        let runner = MockRunner::new();
        runner.on(
            scenarios::ZRAMCTL_JSON,
            CommandOutput::ok(scenarios::ZRAM1_AND_ZRAM10_JSON),
        );
        runner.on(
            scenarios::SWAPON_SHOW,
            CommandOutput::ok(
                "/dev/zram1 partition 1073741824 52428800 50\n/dev/zram10 partition 8589934592 4294967296 10\n",
            ),
        );
        runner.on("swapoff /dev/zram1", CommandOutput::ok(""));
        runner.on("swapon -p 60 /dev/zram1", CommandOutput::ok(""));
        runner.on("zramctl --reset /dev/zram1", CommandOutput::ok(""));
        let store = MemoryConfigStore::default();
        // 500 MiB available, 100 MiB buffer: 50 MiB fits, 4146 MiB does not
        let mgr = manager(&runner, fs, &store);

        assert_eq!(mgr.set_priority("zram1", 60, &mut OpLog::new()).unwrap(), 60);
        assert_eq!(
            mgr.remove(&Target::parse("zram1"), &mut OpLog::new()).unwrap(),
            vec!["/dev/zram1"]
        );
        assert!(!runner.calls().iter().any(|c| c.ends_with("/dev/zram10")));
    }

    #[test]
    fn test_clamp_priority() {
        assert_eq!(clamp_priority(-100), -1);
        assert_eq!(clamp_priority(100), 100);
        assert_eq!(clamp_priority(1 << 40), 32767);
    }
}
