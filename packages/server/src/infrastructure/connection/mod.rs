//! `Connection` implementations.
//!
//! - `websocket`: backed by an axum WebSocket writer task

pub mod websocket;

pub use websocket::{
    OUTBOUND_CAPACITY, OutboundChannel, OutboundReceiver, WebSocketConnection, outbound_channel,
};
