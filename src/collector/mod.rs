//! Kernel access for zram devices.
//!
//! This module provides the readers that turn kernel tool output and kernel
//! files into structured data, with support for mocking in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   DeviceInventory                        │
//! │  - zramctl (json, raw fallback)   - /sys/block/*/stat    │
//! │  - swapon --show                                         │
//! └──────────┬──────────────────────────────┬────────────────┘
//!            │                              │
//!     ┌──────▼────────┐              ┌──────▼──────┐
//!     │ CommandRunner │ (trait)      │  FileSystem │ (trait)
//!     └──────┬────────┘              └──────┬──────┘
//!            │                              │
//!   ┌────────┴─────────┐           ┌────────┴───────┐
//!   │ SystemCommand-   │           │ RealFs         │
//!   │ Runner / Mock    │           │ MockFs         │
//!   └──────────────────┘           └────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use zramkit::collector::{DeviceInventory, mock::scenarios};
//!
//! let (runner, fs) = scenarios::two_devices();
//! let inventory = DeviceInventory::new(runner, fs, "/sys");
//! let devices = inventory.list_devices().unwrap();
//! assert_eq!(devices.len(), 2);
//! ```

pub mod inventory;
pub mod liveness;
pub mod mock;
pub mod parser;
pub mod system;
pub mod traits;

pub use inventory::{DeviceInventory, PRIORITY_AUTO, ZramDevice, device_path, kernel_name};
pub use liveness::{Acquire, InstanceGuard, InstanceLock, ProcessProbe, ProcfsProbe};
pub use mock::{MockFs, MockRunner};
pub use parser::{ParseError, SwapArea};
pub use system::SystemMemory;
pub use traits::{CommandOutput, CommandRunner, FileSystem, RealFs, SystemCommandRunner};
