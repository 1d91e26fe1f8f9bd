//! WebSocket session handling for branch servers.
//!
//! Every data frame a client sends is one request; the session answers each
//! with exactly one text reply frame, in order, on the same connection.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket};
use tracing::{debug, error, info, warn};

use crate::ledger::types::{Reply, Request};
use crate::server::routes::AppState;

type SessionResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// WebSocket session bound to one branch
pub struct BranchSession {
    socket: WebSocket,
    state: AppState,
    session_id: String,
}

impl BranchSession {
    /// Create a new WebSocket session
    pub fn new(socket: WebSocket, state: AppState, session_id: String) -> Self {
        Self {
            socket,
            state,
            session_id,
        }
    }

    /// Answer requests until the client leaves or the connection fails.
    ///
    /// Text and binary frames both carry one JSON request. Pings are answered
    /// by the WebSocket layer itself.
    pub async fn handle(mut self) {
        let branch = self.state.id();
        debug!("Branch {} session {} established", branch, self.session_id);

        let mut answered = 0u64;
        let ending = loop {
            let frame = match self.socket.recv().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    warn!("Branch {} lost {}: {}", branch, self.session_id, e);
                    break "connection error";
                }
                None => break "stream ended",
            };

            let reply = match frame {
                Message::Text(text) => self.answer(text.as_bytes()),
                Message::Binary(bytes) => self.answer(&bytes),
                Message::Close(_) => break "closed by client",
                Message::Ping(_) | Message::Pong(_) => continue,
            };

            if let Err(e) = self.send_reply(&reply).await {
                error!(
                    "Branch {} cannot reply to {}: {}",
                    branch, self.session_id, e
                );
                break "reply failed";
            }
            answered += 1;
        };

        debug!(
            "Branch {} session {} ended ({}) after {} requests",
            branch, self.session_id, ending, answered
        );
    }

    /// Decode one request and deliver it to the branch.
    fn answer(&self, frame: &[u8]) -> Reply {
        match serde_json::from_slice::<Request>(frame) {
            Ok(request) => self.state.deliver(request),
            Err(e) => {
                warn!(
                    "Branch {} cannot decode request from {}: {}",
                    self.state.id(),
                    self.session_id,
                    e
                );
                Reply::unknown_operation()
            }
        }
    }

    async fn send_reply(&mut self, reply: &Reply) -> SessionResult {
        let json = serde_json::to_string(reply)?;
        self.socket.send(Message::Text(json)).await?;
        Ok(())
    }
}

/// Generate a unique session ID
pub fn generate_session_id() -> String {
    static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

    format!("session_{}", NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
}

/// Create and handle a new WebSocket session
pub async fn handle_websocket_connection(socket: WebSocket, state: AppState) {
    let session_id = generate_session_id();
    info!("Branch {} accepted {}", state.id(), session_id);
    let session = BranchSession::new(socket, state, session_id);
    session.handle().await;
}
