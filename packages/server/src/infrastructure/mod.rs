//! Infrastructure layer: wire format and transport-backed connections.

pub mod connection;
pub mod dto;
