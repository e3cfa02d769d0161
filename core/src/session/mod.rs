//! Live subscriber sessions
//!
//! A session couples one persistent connection to one hub. The writer runs
//! in the attaching task and moves messages from the session's bounded
//! delivery queue onto the transport. The reader, spawned only when inbound
//! messages are allowed, relays what the peer sends back into the hub.
//! Either side can end the session through the shared stop token.

pub mod memory;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::hub::{Delivery, Hub};
use crate::{RelayConfig, Result};

pub use memory::{memory_transport, MemoryInbound, MemoryOutbound, MemoryPeer};

/// Sending half of a subscriber connection
#[async_trait]
pub trait Outbound: Send {
    /// Write one message to the peer
    async fn deliver(&mut self, message: &str) -> Result<()>;

    /// Close the connection; must be safe to call on a dead transport
    async fn close(&mut self);
}

/// Receiving half of a subscriber connection
#[async_trait]
pub trait Inbound: Send + 'static {
    /// Next text message, `None` once the peer has gone away
    async fn receive(&mut self) -> Option<Result<String>>;
}

/// Per-session settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Capacity of the delivery queue before the hub evicts the session
    pub queue_capacity: usize,
    /// Spawn a reader that broadcasts inbound messages
    pub allow_incoming: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            allow_incoming: false,
        }
    }
}

impl From<&RelayConfig> for SessionConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            queue_capacity: config.broadcast_buffer,
            allow_incoming: config.allow_incoming,
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The hub stopped the session (center removed, or queue overflow)
    Stopped,
    /// The hub dropped the session's queue
    Released,
    /// Writing to the transport failed
    WriteFailed,
    /// The reader saw the peer go away
    PeerClosed,
}

/// Run a session on `hub` until it ends
///
/// The outbound side is always closed before this returns and the session
/// is unregistered from the hub.
pub async fn run<O, I>(hub: &Hub, config: &SessionConfig, mut outbound: O, inbound: I) -> SessionEnd
where
    O: Outbound,
    I: Inbound,
{
    let (queue_tx, mut queue_rx) = mpsc::channel(config.queue_capacity.max(1));
    let stop = CancellationToken::new();

    let Some(id) = hub.register(queue_tx, stop.clone()) else {
        outbound.close().await;
        return SessionEnd::Stopped;
    };

    let peer_closed = CancellationToken::new();
    let reader = if config.allow_incoming {
        Some(tokio::spawn(read_loop(
            inbound,
            hub.clone(),
            stop.clone(),
            peer_closed.clone(),
        )))
    } else {
        drop(inbound);
        None
    };

    let end = write_loop(&mut outbound, &mut queue_rx, &stop, &peer_closed).await;

    outbound.close().await;
    stop.cancel();
    hub.unregister(id);
    if let Some(reader) = reader {
        let _ = reader.await;
    }

    tracing::debug!(session = id, end = ?end, "Session ended");
    end
}

async fn write_loop<O: Outbound>(
    outbound: &mut O,
    queue: &mut mpsc::Receiver<Delivery>,
    stop: &CancellationToken,
    peer_closed: &CancellationToken,
) -> SessionEnd {
    let stopped = || {
        if peer_closed.is_cancelled() {
            SessionEnd::PeerClosed
        } else {
            SessionEnd::Stopped
        }
    };

    loop {
        let message = tokio::select! {
            biased;
            _ = stop.cancelled() => return stopped(),
            message = queue.recv() => match message {
                Some(message) => message,
                None => return SessionEnd::Released,
            },
        };

        // A write to a stalled peer must not outlive the stop signal.
        tokio::select! {
            biased;
            _ = stop.cancelled() => return stopped(),
            result = outbound.deliver(&message) => {
                if let Err(e) = result {
                    tracing::debug!(error = %e, "Session write failed");
                    return SessionEnd::WriteFailed;
                }
            }
        }
    }
}

async fn read_loop<I: Inbound>(
    mut inbound: I,
    hub: Hub,
    stop: CancellationToken,
    peer_closed: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = stop.cancelled() => return,
            received = inbound.receive() => received,
        };

        match received {
            Some(Ok(message)) => hub.broadcast(message),
            Some(Err(e)) => {
                tracing::debug!(error = %e, "Session read failed");
                break;
            }
            None => break,
        }
    }

    peer_closed.cancel();
    stop.cancel();
}
