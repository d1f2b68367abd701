//! Domain layer: connections, events and their value objects.
//!
//! Transport-agnostic: the infrastructure layer provides WebSocket support
//! by implementing `Connection`.

pub mod connection;
pub mod error;
pub mod event;
pub mod value_object;

pub use connection::Connection;
pub use error::{HubError, SendError, ValueObjectError};
pub use event::Event;
pub use value_object::{ConnectionId, ConnectionIdFactory, Timestamp};
