//! Notification center registry
//!
//! Owns every live center: its last message, its hub and, when centers are
//! configured to expire, the timer that retires it. Each creation is a new
//! incarnation with its own generation number, so a timer left over from a
//! replaced or removed center can never retire its successor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::hub::Hub;
use crate::{CenterId, Error, Identity, Result};

struct CenterEntry {
    last_message: String,
    hub: Hub,
    generation: u64,
    expires_at: Option<Instant>,
    expiry_task: Option<AbortHandle>,
}

impl CenterEntry {
    /// Disconnect subscribers and cancel the expiry timer
    fn retire(self) {
        self.hub.shutdown();
        if let Some(task) = self.expiry_task {
            task.abort();
        }
    }
}

/// Point-in-time view of a center
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CenterInfo {
    pub id: CenterId,
    pub sessions: usize,
    pub expires_in: Option<Duration>,
}

/// Map of live notification centers
#[derive(Clone)]
pub struct CenterRegistry {
    centers: Arc<RwLock<HashMap<CenterId, CenterEntry>>>,
    timeout: Option<Duration>,
    next_generation: Arc<AtomicU64>,
}

impl CenterRegistry {
    /// Create a registry; centers expire `timeout` after creation if set
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            centers: Arc::new(RwLock::new(HashMap::new())),
            timeout: timeout.filter(|t| !t.is_zero()),
            next_generation: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Create the center `name` owned by `owner`
    ///
    /// An existing center with the same id is replaced: its subscribers are
    /// disconnected and its expiry timer cancelled.
    pub async fn create(&self, owner: &Identity, name: &str) -> Result<CenterId> {
        let id = CenterId::new(owner.clone(), name)?;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let (expires_at, expiry_task) = match self.timeout {
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                let registry = self.clone();
                let expiring = id.clone();
                let task = tokio::spawn(async move {
                    tokio::time::sleep_until(deadline).await;
                    registry.expire(&expiring, generation).await;
                });
                (Some(deadline), Some(task.abort_handle()))
            }
            None => (None, None),
        };

        let entry = CenterEntry {
            last_message: String::new(),
            hub: Hub::spawn(id.to_string()),
            generation,
            expires_at,
            expiry_task,
        };

        let previous = self.centers.write().await.insert(id.clone(), entry);
        match previous {
            Some(old) => {
                old.retire();
                tracing::info!(center = %id, "Replaced notification center");
            }
            None => tracing::info!(center = %id, "Created notification center"),
        }

        Ok(id)
    }

    /// Store `message` as the center's last message and broadcast it
    pub async fn notify(&self, id: &CenterId, message: String) -> Result<()> {
        let mut centers = self.centers.write().await;
        let entry = centers.get_mut(id).ok_or_else(|| not_found(id))?;

        entry.hub.broadcast(message.as_str());
        entry.last_message = message;
        Ok(())
    }

    /// Remove a center, disconnecting its subscribers
    pub async fn remove(&self, id: &CenterId) -> Result<()> {
        let entry = self.centers.write().await.remove(id).ok_or_else(|| not_found(id))?;
        entry.retire();
        tracing::info!(center = %id, "Removed notification center");
        Ok(())
    }

    /// Last message published to a center, empty if none yet
    pub async fn last_message(&self, id: &CenterId) -> Result<String> {
        self.centers
            .read()
            .await
            .get(id)
            .map(|entry| entry.last_message.clone())
            .ok_or_else(|| not_found(id))
    }

    /// Hub of a center, for attaching subscribers
    pub async fn hub(&self, id: &CenterId) -> Result<Hub> {
        self.centers
            .read()
            .await
            .get(id)
            .map(|entry| entry.hub.clone())
            .ok_or_else(|| not_found(id))
    }

    pub async fn contains(&self, id: &CenterId) -> bool {
        self.centers.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.centers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.centers.read().await.is_empty()
    }

    /// Info on every live center
    pub async fn snapshot(&self) -> Vec<CenterInfo> {
        let now = Instant::now();
        self.centers
            .read()
            .await
            .iter()
            .map(|(id, entry)| CenterInfo {
                id: id.clone(),
                sessions: entry.hub.stats().sessions(),
                expires_in: entry.expires_at.map(|at| at.saturating_duration_since(now)),
            })
            .collect()
    }

    /// Retire every center
    pub async fn shutdown(&self) {
        let drained: Vec<_> = self.centers.write().await.drain().collect();
        let count = drained.len();
        for (_, entry) in drained {
            entry.retire();
        }
        tracing::info!(centers = count, "Retired all notification centers");
    }

    /// Timer callback; only removes the incarnation that scheduled it
    async fn expire(&self, id: &CenterId, generation: u64) -> bool {
        let mut centers = self.centers.write().await;
        if centers.get(id).map(|entry| entry.generation) != Some(generation) {
            return false;
        }

        if let Some(entry) = centers.remove(id) {
            // The timer is the running task; leave it to finish on its own.
            entry.hub.shutdown();
        }
        tracing::info!(center = %id, "Notification center expired");
        true
    }
}

fn not_found(id: &CenterId) -> Error {
    Error::CenterNotFound(id.to_string())
}
