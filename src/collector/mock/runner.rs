//! Scripted command runner for testing.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};

use crate::collector::traits::{CommandOutput, CommandRunner};

#[derive(Debug, Default)]
struct Inner {
    responses: HashMap<String, VecDeque<CommandOutput>>,
    calls: Vec<String>,
}

/// Command runner that answers from a script and records every call.
///
/// Commands are matched on their full command line (`program arg1 arg2`).
/// Responses registered for the same command line are returned in order;
/// the last one is repeated once the queue is down to it. Unknown commands
/// fail like a missing binary. Clones share the script and the call log, so a
/// test can keep a handle after moving the runner into a component.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    inner: Arc<Mutex<Inner>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for a command line.
    pub fn on(&self, command_line: &str, output: CommandOutput) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .responses
            .entry(command_line.to_string())
            .or_default()
            .push_back(output);
    }

    /// Every command line run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.calls.clone()
    }

    /// Command lines run so far whose program is `program`.
    pub fn calls_to(&self, program: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.split_whitespace().next() == Some(program))
            .collect()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        let mut command_line = program.to_string();
        for arg in args {
            command_line.push(' ');
            command_line.push_str(arg);
        }

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.calls.push(command_line.clone());

        let Some(queue) = inner.responses.get_mut(&command_line) else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: command not found", program),
            ));
        };
        let output = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        output.ok_or_else(|| io::Error::other(format!("{}: no scripted output", program)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_runner_sequence_then_sticky() {
        let runner = MockRunner::new();
        runner.on("zramctl --find", CommandOutput::ok("/dev/zram0\n"));
        runner.on("zramctl --find", CommandOutput::ok("/dev/zram1\n"));

        let first = runner.run("zramctl", &["--find"]).unwrap();
        let second = runner.run("zramctl", &["--find"]).unwrap();
        let third = runner.run("zramctl", &["--find"]).unwrap();
        assert_eq!(first.stdout, "/dev/zram0\n");
        assert_eq!(second.stdout, "/dev/zram1\n");
        assert_eq!(third.stdout, "/dev/zram1\n");
    }

    #[test]
    fn test_mock_runner_unknown_command_and_call_log() {
        let runner = MockRunner::new();
        let shared = runner.clone();
        let err = runner.run("mkswap", &["/dev/zram0"]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(shared.calls(), vec!["mkswap /dev/zram0".to_string()]);
        assert_eq!(shared.calls_to("mkswap").len(), 1);
        assert!(shared.calls_to("swapon").is_empty());
    }
}
