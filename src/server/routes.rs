//! Route handlers for a branch server.
//!
//! This module contains all the HTTP route handlers and related types for the Axum server.

use std::sync::Arc;

use axum::{
    Router,
    extract::{State, ws::WebSocketUpgrade},
    response::{Json, Response},
    routing::get,
};
use serde::Serialize;

use crate::ledger::branch::{Branch, BranchSnapshot};
use crate::ledger::types::BranchId;
use crate::server::websocket::handle_websocket_connection;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub branch: BranchId,
}

/// Shared application state
pub type AppState = Arc<Branch>;

/// Basic health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        branch: state.id(),
    })
}

/// Current balance and write-set token of the branch
pub async fn branch_state(State(state): State<AppState>) -> Json<BranchSnapshot> {
    Json(state.snapshot())
}

/// WebSocket endpoint carrying requests and replies
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, state))
}

/// Creates and configures the router serving one branch
pub fn create_router(branch: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(branch_state))
        .route("/ws", get(ws_handler))
        .with_state(branch)
}
