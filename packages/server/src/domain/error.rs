//! Domain error types.

use thiserror::Error;

/// Errors reported to callers of the connection hub
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// A connection with the same identifier is already registered
    #[error("Connection '{0}' is already registered")]
    DuplicateIdentifier(String),
}

/// Errors raised by a single connection while sending
///
/// The hub treats every variant as "skip this recipient".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The connection has already been closed
    #[error("connection is closed")]
    Closed,

    /// The transport rejected the payload
    #[error("send failed: {0}")]
    Failed(String),

    /// The send did not complete within the per-recipient timeout
    #[error("send timed out")]
    TimedOut,
}

/// Value object validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    /// Connection identifiers must not be empty
    #[error("ConnectionId cannot be empty")]
    ConnectionIdEmpty,
}
