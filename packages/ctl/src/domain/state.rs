//! Server process lifecycle state.

use std::fmt;

/// Lifecycle of the supervised server process
///
/// Only `NotRunning` and `Running` can be reconstructed from disk; `Starting`
/// and `Stopping` exist while a command is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerProcessState {
    NotRunning,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ServerProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotRunning => "not running",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

impl ServerProcessState {
    /// Whether the lifecycle allows moving from `self` to `next`
    ///
    /// ```text
    /// NotRunning -> Starting -> Running -> Stopping -> NotRunning
    ///               Starting -> NotRunning   (spawn failed or foreground exit)
    /// ```
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotRunning, Self::Starting)
                | (Self::Starting, Self::Running)
                | (Self::Starting, Self::NotRunning)
                | (Self::Running, Self::Stopping)
                | (Self::Stopping, Self::NotRunning)
        )
    }
}
