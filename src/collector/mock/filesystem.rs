//! In-memory filesystem for testing readers without real `/proc` and `/sys`.

use crate::collector::traits::FileSystem;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

/// In-memory filesystem for testing.
///
/// Stores files and directories in memory so tests can describe block
/// device stats, meminfo and live pids as plain strings.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }

    /// Adds a file with the given content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    /// Adds `/sys/block/<name>/stat` with the given read and write ticks.
    pub fn add_block_device(&mut self, name: &str, read_ticks: u64, write_ticks: u64) {
        self.add_file(
            format!("/sys/block/{}/stat", name),
            format!(
                "    1520        0    12160 {:>8}    30044        0   240352 {:>8}        0      884      550        0        0        0        0\n",
                read_ticks, write_ticks
            ),
        );
    }

    /// Adds `/proc/meminfo` reporting the given `MemAvailable` in kB.
    pub fn add_meminfo(&mut self, available_kb: u64) {
        self.add_file(
            "/proc/meminfo",
            format!(
                "MemTotal:       16384000 kB\nMemFree:          102400 kB\nMemAvailable:   {:>8} kB\nBuffers:          100000 kB\nCached:          2048000 kB\n",
                available_kb
            ),
        );
    }

    /// Marks a pid as running by creating `/proc/<pid>`.
    pub fn add_process(&mut self, pid: u32) {
        self.add_dir(format!("/proc/{}", pid));
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let mut entries = HashSet::new();
        for file_path in self.files.keys() {
            if file_path.parent().is_some_and(|parent| parent == path) {
                entries.insert(file_path.clone());
            }
        }
        for dir_path in &self.directories {
            if dir_path.parent().is_some_and(|parent| parent == path) && dir_path != path {
                entries.insert(dir_path.clone());
            }
        }

        Ok(entries.into_iter().collect())
    }
}
