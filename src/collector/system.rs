//! System memory queries.

use std::path::Path;

use crate::collector::parser::parse_mem_available;
use crate::collector::traits::FileSystem;
use crate::error::{Result, ZramError};

/// Reads system-wide memory figures from `/proc/meminfo`.
#[derive(Clone)]
pub struct SystemMemory<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> SystemMemory<F> {
    /// Creates a new reader.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    /// RAM the kernel estimates is available without swapping, in bytes.
    pub fn available_ram(&self) -> Result<u64> {
        let path = format!("{}/meminfo", self.proc_path);
        let content = self
            .fs
            .read_to_string(Path::new(&path))
            .map_err(|e| ZramError::Query(format!("{}: {}", path, e)))?;
        parse_mem_available(&content).map_err(|e| ZramError::Query(e.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn test_available_ram_in_bytes() {
        let mut fs = MockFs::new();
        fs.add_meminfo(2048);
        let mem = SystemMemory::new(fs, "/proc");
        assert_eq!(mem.available_ram().unwrap(), 2048 * 1024);
    }

    #[test]
    fn test_available_ram_missing_meminfo() {
        let mem = SystemMemory::new(MockFs::new(), "/proc");
        assert!(matches!(mem.available_ram(), Err(ZramError::Query(_))));
    }
}
