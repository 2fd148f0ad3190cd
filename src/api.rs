//! Action requests and responses for the public operations.
//!
//! A request names one action plus its parameters; [`dispatch`] runs it
//! against a [`DeviceManager`] and always produces a response, folding
//! errors into `success: false`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collector::{CommandRunner, FileSystem, device_path};
use crate::config::{ConfigStore, Settings};
use crate::error::{Result, ZramError};
use crate::manager::{DeviceManager, OpLog};
use crate::safety::{SafetyVerdict, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Remove,
    UpdatePriority,
    CheckSafety,
    Restore,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Remove => "remove",
            Action::UpdatePriority => "update_priority",
            Action::CheckSafety => "check_safety",
            Action::Restore => "restore",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ZramError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "create" => Ok(Action::Create),
            "remove" => Ok(Action::Remove),
            "update_priority" => Ok(Action::UpdatePriority),
            "check_safety" => Ok(Action::CheckSafety),
            "restore" => Ok(Action::Restore),
            other => Err(ZramError::InvalidArgument(format!(
                "invalid action '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: Action,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub algo: Option<String>,
    /// Device name or path; absent or empty means every device.
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub prio: Option<i64>,
}

impl ActionRequest {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            size: None,
            algo: None,
            device: None,
            prio: None,
        }
    }

    fn target(&self) -> Target {
        Target::parse(self.device.as_deref().unwrap_or(""))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub logs: Vec<String>,
    /// Set only when a device was left without active swap.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub critical: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<SafetyVerdict>,
}

impl ActionResponse {
    fn ok(message: String, log: OpLog) -> Self {
        Self {
            success: true,
            message,
            logs: log.into_lines(),
            critical: false,
            verdict: None,
        }
    }

    fn failed(error: &ZramError, log: OpLog) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            logs: log.into_lines(),
            critical: error.is_critical(),
            verdict: None,
        }
    }
}

/// Runs `request`, taking missing `size`/`algo` from `defaults`.
pub fn dispatch<R, F, S>(
    manager: &DeviceManager<R, F, S>,
    defaults: &Settings,
    request: &ActionRequest,
) -> ActionResponse
where
    R: CommandRunner + Clone,
    F: FileSystem + Clone,
    S: ConfigStore,
{
    let mut log = OpLog::new();
    info!(action = %request.action, device = ?request.device, "action requested");

    let result: Result<ActionResponse> = match request.action {
        Action::Create => {
            let size = request.size.as_deref().unwrap_or(&defaults.swap_size);
            let algo = request.algo.as_deref().unwrap_or(&defaults.compression_algo);
            manager.create(size, algo, &mut log).map(|device| {
                ActionResponse::ok(
                    format!("Created zram ({}, {}) on {}", size, algo, device),
                    std::mem::take(&mut log),
                )
            })
        }
        Action::Remove => {
            let target = request.target();
            manager.remove(&target, &mut log).map(|removed| {
                let message = match target {
                    Target::All => format!("Removed all zram devices ({})", removed.len()),
                    Target::Device(_) => format!("Removed {}", removed.join(", ")),
                };
                ActionResponse::ok(message, std::mem::take(&mut log))
            })
        }
        Action::UpdatePriority => update_priority(manager, request, &mut log),
        Action::CheckSafety => manager.check_safety(&request.target()).map(|verdict| {
            let message = match &verdict.reason {
                Some(reason) => reason.clone(),
                None => format!("Safe to remove {}", request.target()),
            };
            ActionResponse {
                success: verdict.safe,
                message,
                logs: Vec::new(),
                critical: false,
                verdict: Some(verdict),
            }
        }),
        Action::Restore => manager.restore(&mut log).map(|created| {
            let message = if created.is_empty() {
                "Nothing to restore".to_string()
            } else {
                format!("Restored {}", created.join(", "))
            };
            ActionResponse::ok(message, std::mem::take(&mut log))
        }),
    };

    result.unwrap_or_else(|e| ActionResponse::failed(&e, log))
}

fn update_priority<R, F, S>(
    manager: &DeviceManager<R, F, S>,
    request: &ActionRequest,
    log: &mut OpLog,
) -> Result<ActionResponse>
where
    R: CommandRunner + Clone,
    F: FileSystem + Clone,
    S: ConfigStore,
{
    let device = request
        .device
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ZramError::InvalidArgument("update_priority needs a device".into()))?;
    let prio = request
        .prio
        .ok_or_else(|| ZramError::InvalidArgument("update_priority needs a priority".into()))?;

    let applied = manager.set_priority(device, prio, log)?;
    Ok(ActionResponse::ok(
        format!("Priority of {} set to {}", device_path(device), applied),
        std::mem::take(log),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CommandOutput;
    use crate::collector::mock::{MockFs, MockRunner, scenarios};
    use crate::config::{MemoryConfigStore, parse_device_list};

    fn manager(
        runner: &MockRunner,
        fs: MockFs,
        store: &MemoryConfigStore,
    ) -> DeviceManager<MockRunner, MockFs, MemoryConfigStore> {
        DeviceManager::new(runner.clone(), fs, store.clone())
    }

    #[test]
    fn test_action_tokens() {
        assert_eq!("update_priority".parse::<Action>().unwrap(), Action::UpdatePriority);
        assert_eq!("restore".parse::<Action>().unwrap(), Action::Restore);
        assert!(matches!(
            "format".parse::<Action>(),
            Err(ZramError::InvalidArgument(_))
        ));

        let req: ActionRequest =
            serde_json::from_str(r#"{"action":"check_safety","device":"zram0"}"#).unwrap();
        assert_eq!(req.action, Action::CheckSafety);
        assert_eq!(req.size, None);
    }

    #[test]
    fn test_create_uses_settings_defaults() {
        let (runner, fs) = scenarios::empty_host();
        runner.on("zramctl --find", CommandOutput::ok("/dev/zram0\n"));
        runner.on("zramctl --algorithm zstd /dev/zram0", CommandOutput::ok(""));
        runner.on("zramctl --size 1G /dev/zram0", CommandOutput::ok(""));
        runner.on("mkswap /dev/zram0", CommandOutput::ok(""));
        runner.on("swapon -p 100 /dev/zram0", CommandOutput::ok(""));
        let store = MemoryConfigStore::default();

        let resp = dispatch(
            &manager(&runner, fs, &store),
            &Settings::default(),
            &ActionRequest::new(Action::Create),
        );

        assert!(resp.success, "{}", resp.message);
        assert_eq!(resp.message, "Created zram (1G, zstd) on /dev/zram0");
        assert!(!resp.logs.is_empty());
        assert!(!resp.critical);
    }

    #[test]
    fn test_unsafe_remove_response() {
        let (runner, mut fs) = scenarios::two_devices();
        fs.add_meminfo(0);
        let store = MemoryConfigStore::default();
        let mgr = manager(&runner, fs, &store).with_safety_buffer(4096 * crate::fmt::MIB);

        let resp = dispatch(&mgr, &Settings::default(), &ActionRequest::new(Action::Remove));
        assert!(!resp.success);
        assert!(resp.message.contains("short by"), "{}", resp.message);
        assert!(!resp.critical);
    }

    #[test]
    fn test_reactivation_failure_is_flagged_critical() {
        let (runner, fs) = scenarios::two_devices();
        runner.on("swapoff /dev/zram0", CommandOutput::ok(""));
        runner.on("swapon -p 7 /dev/zram0", CommandOutput::failed(255, "swapon: failed"));
        let store = MemoryConfigStore::new(Settings {
            devices: parse_device_list("512M:lz4@zram0"),
            ..Settings::default()
        });

        let mut req = ActionRequest::new(Action::UpdatePriority);
        req.device = Some("zram0".into());
        req.prio = Some(7);
        let resp = dispatch(&manager(&runner, fs, &store), &Settings::default(), &req);

        assert!(!resp.success);
        assert!(resp.critical);
        assert!(resp.message.starts_with("CRITICAL: "));
        assert!(resp.logs.iter().any(|l| l == "$ swapoff /dev/zram0"));

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["critical"], true);
    }

    #[test]
    fn test_update_priority_requires_device() {
        let (runner, fs) = scenarios::two_devices();
        let store = MemoryConfigStore::default();
        let mut req = ActionRequest::new(Action::UpdatePriority);
        req.prio = Some(5);

        let resp = dispatch(&manager(&runner, fs, &store), &Settings::default(), &req);
        assert!(!resp.success);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_check_safety_reports_verdict() {
        let (runner, fs) = scenarios::two_devices();
        let store = MemoryConfigStore::default();
        let mut req = ActionRequest::new(Action::CheckSafety);
        req.device = Some("zram1".into());

        let resp = dispatch(&manager(&runner, fs, &store), &Settings::default(), &req);
        assert!(resp.success);
        assert_eq!(
            resp.verdict.map(|v| v.data_to_evacuate),
            Some(50 * crate::fmt::MIB)
        );

        let json = serde_json::to_value(
            dispatch(&manager(&runner, MockFs::new(), &store), &Settings::default(), &req),
        )
        .unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("critical").is_none());
    }
}
