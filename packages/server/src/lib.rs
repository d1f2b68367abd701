//! WebSocket chat relay library.
//!
//! This library provides the connection hub of the Agora chat relay: a registry
//! of open connections with fan-out broadcast, and the axum transport around it.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
