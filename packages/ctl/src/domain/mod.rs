//! Domain layer: lifecycle states and the process-control interface.

pub mod process;
pub mod state;

pub use process::{
    LaunchMode, Launched, PidRecord, ProcessControl, ProcessSnapshot, SERVER_ENV_VARS, ServerCommand,
    SignalKind,
};
pub use state::ServerProcessState;

#[cfg(test)]
pub use process::MockProcessControl;
