//! Web server module for branch replicas.
//!
//! Each branch is served by its own Axum server: requests and replies travel as
//! JSON text frames on `/ws`, with `/health` and `/state` for operators.

pub mod routes;
pub mod websocket;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::ledger::branch::Branch;

// Re-export main server functionality
pub use routes::*;

/// A branch server running on a background task.
pub struct BranchServer {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl BranchServer {
    /// Binds `addr` (port 0 picks a free port) and starts serving `branch`.
    pub async fn bind(branch: Arc<Branch>, addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let id = branch.id();
        info!("Branch {} listening on ws://{}/ws", id, local_addr);

        let app = create_router(branch);
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Branch {} server stopped: {}", id, e);
            }
        });

        Ok(BranchServer { local_addr, handle })
    }

    /// The address the server actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops serving. Connections in flight are dropped.
    pub fn shutdown(self) {
        self.handle.abort();
    }
}
