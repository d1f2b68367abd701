//! Server state shared by the handlers.

use std::sync::Arc;

use crate::usecase::ConnectionHub;

/// Shared application state
pub struct AppState {
    /// Connection registry and broadcaster
    pub hub: Arc<ConnectionHub>,
}
