//! WebSocket-backed `Connection`.
//!
//! The socket itself is owned by the UI layer (`ui/handler/websocket.rs`),
//! which runs a writer task draining the receiving half of an outbound
//! channel. This type holds the sending half plus the open/closed flag.
//!
//! The channel is bounded: when a client stops reading, `send` waits for
//! queue space, and the hub's per-recipient timeout turns that wait into
//! `SendError::TimedOut` instead of letting the queue grow.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{Connection, ConnectionId, SendError};

/// Events queued per connection before `send` starts waiting
pub const OUTBOUND_CAPACITY: usize = 64;

/// Channel feeding a socket's writer task
pub type OutboundChannel = mpsc::Sender<String>;
pub type OutboundReceiver = mpsc::Receiver<String>;

/// Create the outbound queue for one socket
pub fn outbound_channel() -> (OutboundChannel, OutboundReceiver) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

pub struct WebSocketConnection {
    id: ConnectionId,
    sender: OutboundChannel,
    open: AtomicBool,
}

impl WebSocketConnection {
    pub fn new(id: ConnectionId, sender: OutboundChannel) -> Self {
        Self {
            id,
            sender,
            open: AtomicBool::new(true),
        }
    }

    /// Mark the connection closed; later sends fail with `SendError::Closed`
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            tracing::debug!("Connection '{}' marked closed", self.id);
        }
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.sender.is_closed()
    }

    /// Queue a payload for the writer task, waiting while the queue is full
    async fn send(&self, payload: &str) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::Closed);
        }
        // The only send error is a dropped receiver, i.e. the writer task ended.
        self.sender
            .send(payload.to_string())
            .await
            .map_err(|_| SendError::Closed)
    }
}
