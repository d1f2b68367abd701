//! Process supervisor for the Agora chat relay.
//!
//! Starts, stops, restarts and inspects a single `agora-server` process. The
//! supervisor keeps no state between invocations: the PID file is the single
//! source of truth, probed against the OS on every command.

// layers
pub mod domain;
pub mod infrastructure;
pub mod usecase;

pub mod cli;
