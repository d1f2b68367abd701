//! UseCase 層: サーバープロセスのライフサイクル操作

mod error;
mod outcome;
mod supervisor;

pub use error::SupervisorError;
pub use outcome::{NotRunningReason, RestartOutcome, StartOutcome, StatusReport, StopOutcome};
pub use supervisor::{StopPolicy, Supervisor};
