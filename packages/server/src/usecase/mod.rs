//! UseCase 層: 接続ハブ

pub mod hub;

pub use hub::{ConnectionHub, DEFAULT_SEND_TIMEOUT};
