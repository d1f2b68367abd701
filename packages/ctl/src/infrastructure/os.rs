//! OS-backed process control.
//!
//! # Platform behavior
//! - **Unix**: signals and liveness checks via `nix`; resource snapshot via `sysinfo`
//! - **Other**: signals are never delivered and no process is reported alive

use std::{fs::OpenOptions, io, process::Stdio};

use async_trait::async_trait;
use sysinfo::{MINIMUM_CPU_UPDATE_INTERVAL, Pid as SysPid, ProcessesToUpdate, System};
use tokio::process::Command;

use crate::domain::{
    LaunchMode, Launched, ProcessControl, ProcessSnapshot, SERVER_ENV_VARS, ServerCommand, SignalKind,
};

/// Process control backed by the host operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessControl;

impl SystemProcessControl {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessControl for SystemProcessControl {
    async fn spawn(&self, command: &ServerCommand, mode: &LaunchMode) -> io::Result<Launched> {
        let mut cmd = build_command(command);

        match mode {
            LaunchMode::Foreground => run_foreground(cmd).await,
            LaunchMode::Detached { log } => {
                let log_file = OpenOptions::new().create(true).append(true).open(log)?;
                let err_file = log_file.try_clone()?;
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::from(log_file))
                    .stderr(Stdio::from(err_file));
                // Own process group so the terminal's Ctrl+C does not reach the server.
                #[cfg(unix)]
                cmd.process_group(0);

                let child = cmd.spawn()?;
                let pid = child
                    .id()
                    .ok_or_else(|| io::Error::other("spawned process exited before reporting a PID"))?;
                tracing::debug!("Spawned detached server with PID {}", pid);
                Ok(Launched::Detached { pid })
            }
        }
    }

    fn signal(&self, pid: u32, kind: SignalKind) -> bool {
        #[cfg(unix)]
        {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            let Ok(raw) = i32::try_from(pid) else {
                return false;
            };
            let signal = match kind {
                SignalKind::Graceful => Signal::SIGTERM,
                SignalKind::Forceful => Signal::SIGKILL,
            };
            match signal::kill(Pid::from_raw(raw), signal) {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!("Failed to send {:?} to PID {}: {}", signal, pid, e);
                    false
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = (pid, kind);
            false
        }
    }

    fn probe(&self, pid: u32) -> bool {
        pid_exists(pid)
    }

    async fn snapshot(&self, pid: u32) -> Option<ProcessSnapshot> {
        let sys_pid = SysPid::from_u32(pid);
        let mut sys = System::new();

        // CPU usage is computed between two refreshes.
        sys.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);

        let process = sys.process(sys_pid)?;
        Some(ProcessSnapshot {
            cpu_percent: process.cpu_usage(),
            memory_bytes: process.memory(),
            start_time: i64::try_from(process.start_time()).unwrap_or(i64::MAX),
        })
    }
}

/// Command for the server binary: flags from `command`, and none of the
/// server's own environment overrides inherited from this process
fn build_command(command: &ServerCommand) -> Command {
    let mut cmd = Command::new(&command.program);
    cmd.args(command.args());
    for key in SERVER_ENV_VARS {
        cmd.env_remove(key);
    }
    cmd
}

/// Run the server attached to this terminal until it exits
///
/// Ctrl+C reaches the server through the shared process group; the supervisor
/// keeps waiting so it reports the server's own exit.
async fn run_foreground(mut cmd: Command) -> io::Result<Launched> {
    let mut child = cmd.spawn()?;
    loop {
        tokio::select! {
            status = child.wait() => {
                let status = status?;
                return Ok(Launched::Exited { code: status.code() });
            }
            interrupt = tokio::signal::ctrl_c() => {
                if let Err(e) = interrupt {
                    tracing::debug!("Cannot listen for Ctrl+C: {}", e);
                    let status = child.wait().await?;
                    return Ok(Launched::Exited { code: status.code() });
                }
                tracing::info!("Interrupt received, waiting for the server to shut down");
            }
        }
    }
}

/// Check if a PID exists.
///
/// Uses `kill` with null signal which doesn't send a signal but checks existence.
#[cfg(unix)]
pub fn pid_exists(pid: u32) -> bool {
    use nix::sys::signal;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match signal::kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false, // No such process
        Err(_) => true,                         // Process exists but we lack permission
    }
}

#[cfg(not(unix))]
pub fn pid_exists(_pid: u32) -> bool {
    false
}
