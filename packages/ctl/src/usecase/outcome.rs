//! Supervisor の各操作の結果
//!
//! `Display` は CLI がそのまま表示するメッセージです。

use std::fmt;

use crate::domain::ProcessSnapshot;

/// サーバーが起動していないと判断した理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotRunningReason {
    NoPidFile,
    InvalidPid,
    /// PID ファイルのプロセスが存在しない
    ProcessNotFound(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// 起動中のサーバーがあるため何もしなかった
    AlreadyRunning { pid: u32 },
    /// デタッチ起動し、PID を記録した
    Detached { pid: u32 },
    /// フォアグラウンドのサーバーが終了した
    Exited { code: Option<i32> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning(NotRunningReason),
    /// 強制終了が必要だった場合は `forced` が true
    Terminated { pid: u32, forced: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusReport {
    Running {
        pid: u32,
        snapshot: Option<ProcessSnapshot>,
    },
    NotRunning(NotRunningReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartOutcome {
    pub stop: StopOutcome,
    pub start: StartOutcome,
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopOutcome::NotRunning(NotRunningReason::NoPidFile) => write!(
                f,
                "PID file not found. Server is not running or was not started with this tool."
            ),
            StopOutcome::NotRunning(NotRunningReason::InvalidPid) => {
                write!(f, "Invalid PID in file. Removed PID file.")
            }
            StopOutcome::NotRunning(NotRunningReason::ProcessNotFound(pid)) => {
                write!(f, "Process {} not found. Removed PID file.", pid)
            }
            StopOutcome::Terminated { pid, forced: false } => {
                write!(f, "Server (PID {}) terminated successfully.", pid)
            }
            StopOutcome::Terminated { pid, forced: true } => write!(
                f,
                "Server (PID {}) did not terminate gracefully and was killed.",
                pid
            ),
        }
    }
}

impl fmt::Display for StartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartOutcome::AlreadyRunning { pid } => write!(
                f,
                "Server is already running with PID {}. Use 'restart' to restart it.",
                pid
            ),
            StartOutcome::Detached { pid } => write!(f, "Server started with PID {}.", pid),
            StartOutcome::Exited { code: Some(code) } => {
                write!(f, "Server exited with status {}.", code)
            }
            StartOutcome::Exited { code: None } => write!(f, "Server was terminated by a signal."),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusReport::Running { pid, .. } => write!(f, "Server is running with PID {}.", pid),
            StatusReport::NotRunning(NotRunningReason::NoPidFile) => {
                write!(f, "Server is NOT running (no PID file found).")
            }
            StatusReport::NotRunning(NotRunningReason::InvalidPid) => {
                write!(f, "Server is NOT running (invalid PID in file).")
            }
            StatusReport::NotRunning(NotRunningReason::ProcessNotFound(pid)) => write!(
                f,
                "Server is NOT running (PID {} not found).\n\
                 PID file exists but process is not running. Consider removing stale PID file.",
                pid
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_for_stale_pid() {
        // テスト項目: 古い PID ファイルの場合は削除を促すメッセージになる
        // given (前提条件):
        let report = StatusReport::NotRunning(NotRunningReason::ProcessNotFound(99));

        // when (操作):
        let text = report.to_string();

        // then (期待する結果):
        assert!(text.starts_with("Server is NOT running (PID 99 not found)."));
        assert!(text.contains("Consider removing stale PID file."));
    }

    #[test]
    fn test_stop_display_distinguishes_forced_termination() {
        // テスト項目: 強制終了の有無で表示が変わる
        // given (前提条件):
        let graceful = StopOutcome::Terminated { pid: 7, forced: false };
        let forced = StopOutcome::Terminated { pid: 7, forced: true };

        // when (操作):
        let (graceful, forced) = (graceful.to_string(), forced.to_string());

        // then (期待する結果):
        assert_eq!(graceful, "Server (PID 7) terminated successfully.");
        assert!(forced.contains("killed"));
    }
}
