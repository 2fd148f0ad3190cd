//! Seams between zramkit and the host kernel.
//!
//! Everything zramkit learns about zram devices comes either from a file
//! (`/proc/meminfo`, `/sys/block/zram*/stat`, `/sys/module/zram`) or from an
//! external tool (`zramctl`, `swapon`, `mkswap`, ...). [`FileSystem`] and
//! [`CommandRunner`] abstract those two channels so every component can run
//! against canned data in tests.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists entries in a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }
}

/// Result of one external tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed run with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short human-readable description of a failed run.
    pub fn describe_failure(&self) -> String {
        let code = self
            .code
            .map(|c| format!("exit {}", c))
            .unwrap_or_else(|| "killed by signal".to_string());
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            code
        } else {
            format!("{}: {}", code, stderr)
        }
    }
}

/// Runs external tools.
///
/// Spawn failures are reported as `io::Error`; a run that exceeds the
/// runner's timeout is reported as `io::ErrorKind::TimedOut`. A non-zero exit
/// is *not* an error at this level: callers decide what a failure means.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput>;
}

/// Runs tools as real child processes with a hard timeout.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl SystemCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        debug!(program, ?args, "running command");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Pipes are drained on their own threads so a chatty tool cannot
        // block on a full pipe while we poll for exit.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                warn!(program, timeout_ms = self.timeout.as_millis() as u64, "command timed out");
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{} timed out after {:?}", program, self.timeout),
                ));
            }
            thread::sleep(Duration::from_millis(10));
        };

        Ok(CommandOutput {
            code: status.code(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_real_fs_read_to_string() {
        let fs = RealFs::new();
        let cargo_toml = env::current_dir().unwrap().join("Cargo.toml");
        let content = fs.read_to_string(&cargo_toml).unwrap();
        assert!(content.contains("[package]"));
    }

    #[test]
    fn test_real_fs_exists() {
        let fs = RealFs::new();
        let cargo_toml = env::current_dir().unwrap().join("Cargo.toml");
        assert!(fs.exists(&cargo_toml));
        assert!(!fs.exists(Path::new("/nonexistent/path/12345")));
    }

    #[test]
    fn test_command_output_describe_failure() {
        assert_eq!(
            CommandOutput::failed(32, "swapoff: /dev/zram0: Device or resource busy\n")
                .describe_failure(),
            "exit 32: swapoff: /dev/zram0: Device or resource busy"
        );
        assert_eq!(CommandOutput::failed(1, "").describe_failure(), "exit 1");
        assert!(CommandOutput::ok("").success());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_stdout_and_exit_code() {
        let runner = SystemCommandRunner::default();
        let out = runner.run("sh", &["-c", "echo hello; exit 3"]).unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.code, Some(3));
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_times_out() {
        let runner = SystemCommandRunner::new(Duration::from_millis(100));
        let err = runner.run("sleep", &["5"]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_system_runner_missing_binary() {
        let runner = SystemCommandRunner::default();
        assert!(runner.run("definitely-not-a-real-tool-12345", &[]).is_err());
    }
}
