//! Utilities shared by the Agora server and supervisor crates.

pub mod logger;
pub mod time;
