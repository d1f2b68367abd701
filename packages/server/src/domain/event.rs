//! Events flowing through the hub.

use super::{ConnectionId, Timestamp};

/// One message unit broadcast by the hub
///
/// Events are immutable once built. Recipient-specific framing, if any, is the
/// transport's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Notice generated by the hub itself (join / leave)
    System { message: String },
    /// Message delivered by a connection
    Chat {
        message: String,
        sender: ConnectionId,
        timestamp: Timestamp,
    },
}

impl Event {
    /// Notice announcing that `id` joined
    pub fn joined(id: &ConnectionId) -> Self {
        Self::System {
            message: format!("User {} has joined the chat", id),
        }
    }

    /// Notice announcing that `id` left
    pub fn left(id: &ConnectionId) -> Self {
        Self::System {
            message: format!("User {} has left the chat", id),
        }
    }

    pub fn chat(message: String, sender: ConnectionId, timestamp: Timestamp) -> Self {
        Self::Chat {
            message,
            sender,
            timestamp,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::System { message } | Self::Chat { message, .. } => message,
        }
    }

    /// Sender of a chat event, `None` for system notices
    pub fn sender(&self) -> Option<&ConnectionId> {
        match self {
            Self::System { .. } => None,
            Self::Chat { sender, .. } => Some(sender),
        }
    }
}
