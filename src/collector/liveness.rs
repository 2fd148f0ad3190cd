//! Single-instance guard for long-running collectors.
//!
//! A collector records its pid in a pid file. A new instance reads that file
//! and asks a [`ProcessProbe`] whether the recorded process is still alive;
//! if it is, the new instance must not start.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::collector::traits::FileSystem;
use crate::error::Result;
use crate::util::write_atomic;

/// Answers "is a process with this pid running?".
pub trait ProcessProbe: Send + Sync {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Probe backed by the existence of `/proc/<pid>`.
#[derive(Clone)]
pub struct ProcfsProbe<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> ProcfsProbe<F> {
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }
}

impl<F: FileSystem> ProcessProbe for ProcfsProbe<F> {
    fn is_alive(&self, pid: u32) -> bool {
        pid != 0 && self.fs.exists(&Path::new(&self.proc_path).join(pid.to_string()))
    }
}

/// Outcome of [`InstanceLock::acquire`].
#[derive(Debug)]
pub enum Acquire {
    /// This process now owns the pid file.
    Acquired(InstanceGuard),
    /// Another live instance owns it.
    AlreadyRunning(u32),
}

/// Pid-file based singleton check.
pub struct InstanceLock<P: ProcessProbe> {
    pid_path: PathBuf,
    probe: P,
}

impl<P: ProcessProbe> InstanceLock<P> {
    pub fn new(pid_path: impl Into<PathBuf>, probe: P) -> Self {
        Self {
            pid_path: pid_path.into(),
            probe,
        }
    }

    /// Pid recorded in the pid file, if any parses.
    pub fn recorded_pid(&self) -> Option<u32> {
        std::fs::read_to_string(&self.pid_path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    /// Claims the pid file for `own_pid` unless a different live process holds it.
    ///
    /// A stale pid file (dead pid, garbage content) is overwritten.
    pub fn acquire(&self, own_pid: u32) -> Result<Acquire> {
        if let Some(pid) = self.recorded_pid() {
            if pid != own_pid && self.probe.is_alive(pid) {
                return Ok(Acquire::AlreadyRunning(pid));
            }
            debug!(pid, "replacing stale pid file");
        }

        write_atomic(&self.pid_path, own_pid.to_string().as_bytes())?;
        Ok(Acquire::Acquired(InstanceGuard {
            pid_path: self.pid_path.clone(),
            pid: own_pid,
        }))
    }
}

/// Held while this process is the active instance; removes the pid file on drop.
#[derive(Debug)]
pub struct InstanceGuard {
    pid_path: PathBuf,
    pid: u32,
}

impl InstanceGuard {
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        let still_ours = std::fs::read_to_string(&self.pid_path)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            == Some(self.pid);
        if still_ours && let Err(e) = std::fs::remove_file(&self.pid_path) {
            warn!(error = %e, path = %self.pid_path.display(), "failed to remove pid file");
        }
    }
}
