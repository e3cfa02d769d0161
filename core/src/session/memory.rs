//! In-process transport
//!
//! Lets a session run without a network connection. The peer side reads
//! what the session delivers and can send messages back. The channel to the
//! peer is bounded, so a peer that stops reading behaves like a slow
//! network client.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Inbound, Outbound};
use crate::{Error, Result};

/// Session-side sending half
pub struct MemoryOutbound {
    to_peer: Option<mpsc::Sender<String>>,
}

/// Session-side receiving half
pub struct MemoryInbound {
    from_peer: mpsc::Receiver<String>,
}

/// The remote end of an in-memory connection
pub struct MemoryPeer {
    incoming: mpsc::Receiver<String>,
    outgoing: mpsc::Sender<String>,
}

/// Create a connected transport; `capacity` bounds each direction
pub fn memory_transport(capacity: usize) -> (MemoryOutbound, MemoryInbound, MemoryPeer) {
    let (to_peer, incoming) = mpsc::channel(capacity.max(1));
    let (outgoing, from_peer) = mpsc::channel(capacity.max(1));

    (
        MemoryOutbound {
            to_peer: Some(to_peer),
        },
        MemoryInbound { from_peer },
        MemoryPeer { incoming, outgoing },
    )
}

#[async_trait]
impl Outbound for MemoryOutbound {
    async fn deliver(&mut self, message: &str) -> Result<()> {
        let to_peer = self
            .to_peer
            .as_ref()
            .ok_or_else(|| Error::Transport("connection closed".to_string()))?;
        to_peer
            .send(message.to_string())
            .await
            .map_err(|_| Error::Transport("peer went away".to_string()))
    }

    async fn close(&mut self) {
        self.to_peer.take();
    }
}

#[async_trait]
impl Inbound for MemoryInbound {
    async fn receive(&mut self) -> Option<Result<String>> {
        self.from_peer.recv().await.map(Ok)
    }
}

impl MemoryPeer {
    /// Next delivered message, `None` once the session closed the connection
    pub async fn recv(&mut self) -> Option<String> {
        self.incoming.recv().await
    }

    /// Delivered message if one is already buffered
    pub fn try_recv(&mut self) -> Option<String> {
        self.incoming.try_recv().ok()
    }

    /// Send a message to the session
    pub async fn send(&self, message: impl Into<String>) -> Result<()> {
        self.outgoing
            .send(message.into())
            .await
            .map_err(|_| Error::Transport("session went away".to_string()))
    }

    /// Close the connection from the peer's side
    pub fn hang_up(self) {}
}
