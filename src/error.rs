//! Error type shared by every zramkit component.

use std::fmt;

/// Step of the create sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    ModuleLoad,
    FindDevice,
    Algorithm,
    Size,
    Format,
    Activate,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisionStep::ModuleLoad => "module load",
            ProvisionStep::FindDevice => "find device",
            ProvisionStep::Algorithm => "set algorithm",
            ProvisionStep::Size => "set size",
            ProvisionStep::Format => "format",
            ProvisionStep::Activate => "activate",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum ZramError {
    /// Kernel tool unavailable, timed out, or produced unparseable output.
    Query(String),
    /// A step of the create sequence failed.
    Provisioning { step: ProvisionStep, message: String },
    /// The safety check refused to evacuate the target.
    UnsafeRemoval { reason: String },
    /// `swapoff` failed; the device was left untouched.
    Deactivation { device: String, message: String },
    /// `swapon` failed after a successful `swapoff`: the device is offline.
    Reactivation { device: String, message: String },
    /// The named device is not present on the host.
    DeviceNotFound(String),
    /// A caller-supplied argument was rejected before touching the kernel.
    InvalidArgument(String),
    /// The settings file could not be read or written.
    Config(String),
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl ZramError {
    /// Reactivation failures leave a device without active swap and must be
    /// surfaced apart from ordinary failures.
    pub fn is_critical(&self) -> bool {
        matches!(self, ZramError::Reactivation { .. })
    }
}

impl fmt::Display for ZramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZramError::Query(msg) => write!(f, "query failed: {}", msg),
            ZramError::Provisioning { step, message } => {
                write!(f, "provisioning failed at {}: {}", step, message)
            }
            ZramError::UnsafeRemoval { reason } => write!(f, "unsafe: {}", reason),
            ZramError::Deactivation { device, message } => {
                write!(f, "failed to deactivate {}: {}", device, message)
            }
            ZramError::Reactivation { device, message } => write!(
                f,
                "CRITICAL: {} was deactivated but could not be reactivated ({}); no swap is active on it",
                device, message
            ),
            ZramError::DeviceNotFound(name) => write!(f, "device {} not found", name),
            ZramError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            ZramError::Config(msg) => write!(f, "config error: {}", msg),
            ZramError::Io(e) => write!(f, "I/O error: {}", e),
            ZramError::Serialization(e) => write!(f, "serialization error: {}", e),
        }
    }
}

impl std::error::Error for ZramError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ZramError::Io(e) => Some(e),
            ZramError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ZramError {
    fn from(e: std::io::Error) -> Self {
        ZramError::Io(e)
    }
}

impl From<serde_json::Error> for ZramError {
    fn from(e: serde_json::Error) -> Self {
        ZramError::Serialization(e)
    }
}

pub type Result<T> = std::result::Result<T, ZramError>;
