//! Safety Evaluator: may a zram device be evacuated without OOM risk?
//!
//! Taking a zram swap offline forces the kernel to move every page it holds
//! back into RAM or onto another swap area. The evaluator compares the data
//! that would have to move against available RAM plus free non-zram swap,
//! minus a fixed buffer. Inputs are read fresh on every call.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collector::{CommandRunner, DeviceInventory, FileSystem, SystemMemory};
use crate::error::Result;
use crate::fmt::{MIB, mib_ceil};

/// Default headroom kept free after evacuation.
pub const DEFAULT_BUFFER: u64 = 100 * MIB;

/// Which devices an operation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    /// A device name or path; matches every device whose path contains it.
    Device(String),
}

impl Target {
    /// An empty name or `all` targets every device.
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("all") {
            Target::All
        } else {
            Target::Device(name.to_string())
        }
    }

    pub fn matches(&self, device_name: &str) -> bool {
        match self {
            Target::All => true,
            Target::Device(name) => device_name.contains(name.as_str()),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::All => f.write_str("all devices"),
            Target::Device(name) => f.write_str(name),
        }
    }
}

/// Outcome of a safety check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub safe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Uncompressed bytes that would have to move.
    pub data_to_evacuate: u64,
    pub available_ram: u64,
    pub other_swap_free: u64,
    pub buffer: u64,
}

/// Pure decision: `data <= available + other_swap_free - buffer`.
pub fn assess(
    data_to_evacuate: u64,
    available_ram: u64,
    other_swap_free: u64,
    buffer: u64,
) -> SafetyVerdict {
    let capacity = available_ram.saturating_add(other_swap_free);
    let usable = capacity.saturating_sub(buffer);
    let safe = data_to_evacuate <= usable;

    let reason = (!safe).then(|| {
        format!(
            "not enough memory to evacuate {} MiB: {} MiB RAM + {} MiB other swap available, {} MiB kept as buffer (short by {} MiB)",
            mib_ceil(data_to_evacuate),
            available_ram / MIB,
            other_swap_free / MIB,
            buffer / MIB,
            mib_ceil(data_to_evacuate - usable),
        )
    });

    SafetyVerdict {
        safe,
        reason,
        data_to_evacuate,
        available_ram,
        other_swap_free,
        buffer,
    }
}

/// Evaluates evacuation safety against the live system.
pub struct SafetyEvaluator<R: CommandRunner, F: FileSystem> {
    inventory: DeviceInventory<R, F>,
    memory: SystemMemory<F>,
    buffer: u64,
}

impl<R: CommandRunner, F: FileSystem> SafetyEvaluator<R, F> {
    pub fn new(inventory: DeviceInventory<R, F>, memory: SystemMemory<F>) -> Self {
        Self {
            inventory,
            memory,
            buffer: DEFAULT_BUFFER,
        }
    }

    pub fn with_buffer(mut self, buffer: u64) -> Self {
        self.buffer = buffer;
        self
    }

    /// Computes the verdict for `target`.
    ///
    /// Failing to list devices or read available memory is an error: the
    /// caller must not proceed without a verdict. Failing to list swap areas
    /// counts other swap as empty, which can only make the verdict stricter.
    pub fn evaluate(&self, target: &Target) -> Result<SafetyVerdict> {
        let verdict = self.evaluate_where(|name| target.matches(name))?;
        debug!(target = %target, safe = verdict.safe, "safety evaluated");
        Ok(verdict)
    }

    /// Computes the verdict for exactly one resolved device path.
    ///
    /// Unlike [`Target::matches`], `/dev/zram1` does not cover `/dev/zram10`.
    pub fn evaluate_device(&self, path: &str) -> Result<SafetyVerdict> {
        let verdict = self.evaluate_where(|name| name == path)?;
        debug!(device = path, safe = verdict.safe, "safety evaluated");
        Ok(verdict)
    }

    fn evaluate_where(&self, selected: impl Fn(&str) -> bool) -> Result<SafetyVerdict> {
        let data: u64 = self
            .inventory
            .list_devices()?
            .iter()
            .filter(|d| selected(&d.name))
            .map(|d| d.data)
            .sum();

        let available = self.memory.available_ram()?;

        let other_swap_free = match self.inventory.swap_areas() {
            Ok(areas) => areas
                .iter()
                .filter(|a| !a.is_zram())
                .map(|a| a.free())
                .sum(),
            Err(e) => {
                warn!(error = %e, "cannot list swap areas, assuming no other swap");
                0
            }
        };

        debug!(data, available, other_swap_free, buffer = self.buffer, "safety inputs");
        Ok(assess(data, available, other_swap_free, self.buffer))
    }
}
