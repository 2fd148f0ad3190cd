//! Fakes for testing without a real kernel.
//!
//! `MockFs` stands in for `/proc` and `/sys`, `MockRunner` for `zramctl`,
//! `swapon` and friends. `scenarios` wires both into typical host states.

mod filesystem;
mod runner;
pub mod scenarios;

pub use filesystem::MockFs;
pub use runner::MockRunner;
