//! zramkit - zram swap device management library.
//!
//! This library provides the core functionality shared between:
//! - `zramkitd` - background collector sampling memory savings and load
//! - `zramkit` - command-line front door for status and device operations

pub mod api;
pub mod collector;
pub mod config;
pub mod error;
pub mod fmt;
pub mod history;
pub mod manager;
pub mod metrics;
pub mod safety;
pub mod status;
pub mod util;

pub use error::{Result, ZramError};
