//! Process-control abstraction.
//!
//! Interface to the OS-dependent operations: spawning, signalling, liveness
//! checks and resource snapshots. The infrastructure layer implements it.

use std::{ffi::OsString, io, path::PathBuf};

use async_trait::async_trait;

/// Signal escalation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Polite shutdown request (SIGTERM)
    Graceful,
    /// Unconditional kill (SIGKILL)
    Forceful,
}

/// Resource usage of a running process
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSnapshot {
    pub cpu_percent: f32,
    pub memory_bytes: u64,
    /// Unix timestamp (seconds) at which the process started
    pub start_time: i64,
}

/// Contents of the PID file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidRecord {
    /// No PID file exists
    Missing,
    /// The file exists but does not hold a positive decimal PID
    Invalid,
    Pid(u32),
}

/// Environment variables `agora-server` reads in place of its flags
///
/// The supervisor passes every setting as a flag, so these are removed from the
/// child's environment. A value the supervisor chose to omit (such as a missing
/// config file) must not reach the server through the environment.
pub const SERVER_ENV_VARS: [&str; 4] = ["AGORA_HOST", "AGORA_PORT", "AGORA_WORKERS", "AGORA_CONFIG"];

/// Command line used to launch the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub program: PathBuf,
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub config: Option<PathBuf>,
}

impl ServerCommand {
    /// Arguments passed to the server binary
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--host".into(),
            self.host.clone().into(),
            "--port".into(),
            self.port.to_string().into(),
        ];
        if let Some(workers) = self.workers {
            args.push("--workers".into());
            args.push(workers.to_string().into());
        }
        if let Some(config) = &self.config {
            args.push("--config".into());
            args.push(config.clone().into_os_string());
        }
        args
    }
}

/// How the server process is launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchMode {
    /// Block until the server exits, streaming its output
    Foreground,
    /// Return immediately, appending the server's output to `log`
    Detached { log: PathBuf },
}

/// Result of a successful spawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launched {
    /// Foreground server has exited (`None` when killed by a signal)
    Exited { code: Option<i32> },
    /// Detached server is running with this PID
    Detached { pid: u32 },
}

/// OS process control used by the supervisor
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Launch the server
    async fn spawn(&self, command: &ServerCommand, mode: &LaunchMode) -> io::Result<Launched>;

    /// Deliver a signal; `false` if it could not be delivered
    fn signal(&self, pid: u32, kind: SignalKind) -> bool;

    /// Whether a process with this PID is alive
    fn probe(&self, pid: u32) -> bool;

    /// Resource usage, `None` if unavailable
    async fn snapshot(&self, pid: u32) -> Option<ProcessSnapshot>;
}
