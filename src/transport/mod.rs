//! Request/reply channels between customers and branches.
//!
//! A [`Transport`] resolves a branch id and carries one [`Request`] to it,
//! returning the branch's [`Reply`]. Customers use it to reach branches and
//! the propagator uses it to reach peers.

pub mod local;
pub mod websocket;

use std::future::Future;

use crate::ledger::types::{BranchId, Reply, Request};

pub use local::InProcessTransport;
pub use websocket::WebSocketTransport;

/// Errors raised while carrying a request to a branch.
///
/// A `failed` reply is not an error; it is delivered as a normal [`Reply`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no address known for branch {0}")]
    UnknownBranch(BranchId),
    #[error("branch {0} closed the connection without replying")]
    ConnectionClosed(BranchId),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// A synchronous request/reply channel to any branch in a topology.
pub trait Transport: Clone + Send + Sync + 'static {
    fn deliver(
        &self,
        dest: BranchId,
        request: Request,
    ) -> impl Future<Output = Result<Reply, TransportError>> + Send;
}
