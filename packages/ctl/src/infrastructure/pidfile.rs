//! Atomic PID file I/O operations.
//!
//! Format: single-line text file
//! ```text
//! <pid>
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::domain::PidRecord;

/// PID file recording the detached server process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the recorded PID
    ///
    /// Never fails: a missing file is `Missing`, anything that is not a
    /// positive decimal PID is `Invalid`.
    pub fn read(&self) -> PidRecord {
        match fs::read_to_string(&self.path) {
            Ok(content) => parse_pidfile_content(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => PidRecord::Missing,
            Err(e) => {
                tracing::warn!("Failed to read PID file '{}': {}", self.path.display(), e);
                PidRecord::Invalid
            }
        }
    }

    /// Write PID file atomically using temp file + rename.
    ///
    /// Parent directories are created when missing.
    pub fn write(&self, pid: u32) -> io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let temp_path = self.temp_path();
        fs::write(&temp_path, format!("{}\n", pid))?;
        fs::rename(&temp_path, &self.path)
    }

    /// Delete PID file (idempotent - no error if missing).
    pub fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        PathBuf::from(temp)
    }
}

fn parse_pidfile_content(content: &str) -> PidRecord {
    match content.trim().parse::<u32>() {
        Ok(pid) if pid > 0 => PidRecord::Pid(pid),
        _ => PidRecord::Invalid,
    }
}
