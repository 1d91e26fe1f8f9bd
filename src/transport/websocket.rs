//! WebSocket transport: one JSON text frame out, one JSON text frame back.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use crossbeam_skiplist::SkipMap;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::ledger::types::{BranchId, Reply, Request};
use crate::transport::{Transport, TransportError};

/// Reaches branch servers over their `/ws` endpoint.
///
/// Branch addresses are only known once every server has bound its port, so
/// the directory is shared between clones and filled in with
/// [`WebSocketTransport::register`]. Each delivery opens a fresh connection,
/// sends the request, waits for the first text frame in reply and closes.
#[derive(Clone, Default)]
pub struct WebSocketTransport {
    directory: Arc<SkipMap<BranchId, SocketAddr>>,
}

impl WebSocketTransport {
    pub fn register(&self, id: BranchId, addr: SocketAddr) {
        self.directory.insert(id, addr);
    }

    pub fn address(&self, id: BranchId) -> Option<SocketAddr> {
        self.directory.get(&id).map(|entry| *entry.value())
    }
}

impl Transport for WebSocketTransport {
    fn deliver(
        &self,
        dest: BranchId,
        request: Request,
    ) -> impl Future<Output = Result<Reply, TransportError>> + Send {
        let addr = self.address(dest);
        async move {
            let addr = addr.ok_or(TransportError::UnknownBranch(dest))?;
            let url = format!("ws://{}/ws", addr);
            let (mut stream, _) = connect_async(url.as_str()).await?;

            let frame = serde_json::to_string(&request)?;
            stream.send(Message::Text(frame)).await?;

            while let Some(message) = stream.next().await {
                match message? {
                    Message::Text(text) => {
                        let reply: Reply = serde_json::from_str(&text)?;
                        if let Err(e) = stream.close(None).await {
                            debug!("Closing connection to branch {} failed: {}", dest, e);
                        }
                        return Ok(reply);
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Err(TransportError::ConnectionClosed(dest))
        }
    }
}
