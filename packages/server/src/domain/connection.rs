//! Connection trait.
//!
//! The bidirectional connection the hub sends to. Concrete transports
//! (WebSocket) live in the infrastructure layer.

use async_trait::async_trait;

use super::{ConnectionId, SendError};

/// One live bidirectional channel
///
/// A connection is registered into the hub when accepted and removed when it
/// disconnects. The hub never sends to a connection after removing it.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Identifier assigned at accept time, stable for the connection's lifetime
    fn id(&self) -> &ConnectionId;

    /// Whether the transport still accepts outbound payloads
    fn is_open(&self) -> bool;

    /// Send one encoded payload to the peer
    async fn send(&self, payload: &str) -> Result<(), SendError>;
}
