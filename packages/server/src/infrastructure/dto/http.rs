//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// Response of `GET /api/connections`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionsDto {
    pub count: usize,
    pub connections: Vec<String>,
}
