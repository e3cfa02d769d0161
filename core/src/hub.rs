//! Per-center publish/subscribe hub
//!
//! A hub is a single tokio task that owns the set of live sessions of one
//! notification center. Every mutation goes through its command channel, so
//! register, unregister, broadcast and shutdown are applied one at a time in
//! arrival order. Broadcasting never waits on a subscriber: a session whose
//! delivery queue is full is evicted on the spot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Identifier of a session within its hub
pub type SessionId = u64;

/// Messages travel to sessions shared, not copied per subscriber
pub type Delivery = Arc<str>;

/// Commands processed by the hub loop
enum HubCommand {
    Register {
        id: SessionId,
        queue: mpsc::Sender<Delivery>,
        stop: CancellationToken,
    },
    Unregister {
        id: SessionId,
    },
    Broadcast {
        message: Delivery,
    },
    SessionCount {
        response: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Delivery counters, readable without a round trip through the loop
#[derive(Debug, Default)]
pub struct HubStats {
    sessions: AtomicUsize,
    broadcasts: AtomicU64,
    delivered: AtomicU64,
    evicted: AtomicU64,
}

impl HubStats {
    /// Sessions currently registered
    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::Relaxed)
    }

    /// Broadcasts processed
    pub fn broadcasts(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }

    /// Messages placed on a session queue
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Sessions dropped because their queue was full
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

/// Handle to a running hub
///
/// Cheap to clone. The loop stops, disconnecting every session, on
/// [`Hub::shutdown`] or once the last handle is dropped.
#[derive(Clone)]
pub struct Hub {
    command_tx: mpsc::UnboundedSender<HubCommand>,
    stats: Arc<HubStats>,
    next_session: Arc<AtomicU64>,
}

struct HubWorker {
    label: String,
    command_rx: mpsc::UnboundedReceiver<HubCommand>,
    sessions: HashMap<SessionId, Member>,
    stats: Arc<HubStats>,
}

struct Member {
    queue: mpsc::Sender<Delivery>,
    stop: CancellationToken,
}

impl Hub {
    /// Spawn a hub loop on the current runtime
    ///
    /// `label` only shows up in logs.
    pub fn spawn(label: impl Into<String>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(HubStats::default());

        let worker = HubWorker {
            label: label.into(),
            command_rx,
            sessions: HashMap::new(),
            stats: stats.clone(),
        };
        tokio::spawn(worker.run());

        Self {
            command_tx,
            stats,
            next_session: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Add a session
    ///
    /// Returns `None` when the hub has already stopped; the queue and stop
    /// token are dropped untouched in that case.
    pub fn register(&self, queue: mpsc::Sender<Delivery>, stop: CancellationToken) -> Option<SessionId> {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.command_tx
            .send(HubCommand::Register { id, queue, stop })
            .ok()
            .map(|_| id)
    }

    /// Remove a session; its queue sender is dropped
    pub fn unregister(&self, id: SessionId) {
        let _ = self.command_tx.send(HubCommand::Unregister { id });
    }

    /// Queue a message for every registered session without waiting
    pub fn broadcast(&self, message: impl Into<Delivery>) {
        let _ = self.command_tx.send(HubCommand::Broadcast {
            message: message.into(),
        });
    }

    /// Number of registered sessions, 0 once the hub has stopped
    pub async fn session_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.command_tx.send(HubCommand::SessionCount { response: tx }).is_err() {
            return 0;
        }
        rx.await.unwrap_or_default()
    }

    /// Stop every session and end the loop
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(HubCommand::Shutdown);
    }

    /// Whether the loop has ended
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    pub fn stats(&self) -> &HubStats {
        &self.stats
    }
}

impl HubWorker {
    async fn run(mut self) {
        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                HubCommand::Register { id, queue, stop } => {
                    self.sessions.insert(id, Member { queue, stop });
                    tracing::debug!(hub = %self.label, session = id, "Session registered");
                }
                HubCommand::Unregister { id } => {
                    if self.sessions.remove(&id).is_some() {
                        tracing::debug!(hub = %self.label, session = id, "Session unregistered");
                    }
                }
                HubCommand::Broadcast { message } => {
                    self.broadcast(message);
                }
                HubCommand::SessionCount { response } => {
                    let _ = response.send(self.sessions.len());
                }
                HubCommand::Shutdown => break,
            }
            self.stats.sessions.store(self.sessions.len(), Ordering::Relaxed);
        }

        // Shut down explicitly or every handle dropped.
        for (_, member) in self.sessions.drain() {
            member.stop.cancel();
        }
        self.stats.sessions.store(0, Ordering::Relaxed);
        tracing::debug!(hub = %self.label, "Hub stopped");
    }

    fn broadcast(&mut self, message: Delivery) {
        self.stats.broadcasts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(hub = %self.label, sessions = self.sessions.len(), "Broadcasting message");

        let label = &self.label;
        let stats = &self.stats;
        self.sessions.retain(|id, member| {
            match member.queue.try_send(message.clone()) {
                Ok(()) => {
                    stats.delivered.fetch_add(1, Ordering::Relaxed);
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(hub = %label, session = *id, "Delivery queue full, evicting session");
                    stats.evicted.fetch_add(1, Ordering::Relaxed);
                    member.stop.cancel();
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(capacity: usize) -> (mpsc::Sender<Delivery>, mpsc::Receiver<Delivery>, CancellationToken) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, rx, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_broadcast_reaches_registered_sessions() {
        let hub = Hub::spawn("test");
        let (tx_a, mut rx_a, stop_a) = member(4);
        let (tx_b, mut rx_b, stop_b) = member(4);
        hub.register(tx_a, stop_a).unwrap();
        hub.register(tx_b, stop_b).unwrap();

        hub.broadcast("hello");

        assert_eq!(&*rx_a.recv().await.unwrap(), "hello");
        assert_eq!(&*rx_b.recv().await.unwrap(), "hello");
        assert_eq!(hub.session_count().await, 2);
        assert_eq!(hub.stats().delivered(), 2);
    }

    #[tokio::test]
    async fn test_full_queue_evicts_only_that_session() {
        let hub = Hub::spawn("test");
        let (slow_tx, _slow_rx, slow_stop) = member(1);
        let (fast_tx, mut fast_rx, fast_stop) = member(8);
        hub.register(slow_tx, slow_stop.clone()).unwrap();
        hub.register(fast_tx, fast_stop.clone()).unwrap();

        hub.broadcast("one");
        hub.broadcast("two");

        assert_eq!(&*fast_rx.recv().await.unwrap(), "one");
        assert_eq!(&*fast_rx.recv().await.unwrap(), "two");
        assert_eq!(hub.session_count().await, 1);
        assert!(slow_stop.is_cancelled());
        assert!(!fast_stop.is_cancelled());
        assert_eq!(hub.stats().evicted(), 1);
    }

    #[tokio::test]
    async fn test_unregister_releases_queue() {
        let hub = Hub::spawn("test");
        let (tx, mut rx, stop) = member(4);
        let id = hub.register(tx, stop.clone()).unwrap();

        hub.unregister(id);

        assert!(rx.recv().await.is_none());
        assert!(!stop.is_cancelled());
        assert_eq!(hub.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_sessions() {
        let hub = Hub::spawn("test");
        let (tx, _rx, stop) = member(4);
        hub.register(tx, stop.clone()).unwrap();

        hub.shutdown();
        stop.cancelled().await;

        assert_eq!(hub.session_count().await, 0);
        assert!(hub.is_closed());
        assert!(hub.register(mpsc::channel(1).0, CancellationToken::new()).is_none());
    }

    #[tokio::test]
    async fn test_dropping_last_handle_stops_sessions() {
        let hub = Hub::spawn("test");
        let (tx, _rx, stop) = member(4);
        hub.register(tx, stop.clone()).unwrap();

        drop(hub);
        stop.cancelled().await;
    }
}
