//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::{infrastructure::dto::http::ConnectionsDto, ui::state::AppState};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// List the identifiers of currently registered connections
pub async fn list_connections(State(state): State<Arc<AppState>>) -> Json<ConnectionsDto> {
    let connections: Vec<String> = state
        .hub
        .connection_ids()
        .await
        .into_iter()
        .map(|id| id.into_string())
        .collect();

    Json(ConnectionsDto {
        count: connections.len(),
        connections,
    })
}
