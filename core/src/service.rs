//! Distribution service - the entry point transports call into
//!
//! Every publisher-side operation is authenticated before it touches any
//! center state. Subscriber-side operations (`poll`, `attach`) are open.

use std::sync::Arc;
use std::time::Duration;

use crate::crypto::SignatureVerifier;
use crate::directory::KeyDirectory;
use crate::registry::{CenterInfo, CenterRegistry};
use crate::session::{self, Inbound, Outbound, SessionConfig, SessionEnd};
use crate::{CenterId, Error, Identity, RelayConfig, Result, CENTER_DELIMITER};

/// Aggregate counters across live centers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub centers: usize,
    pub sessions: usize,
}

pub struct DistributionService {
    directory: Arc<dyn KeyDirectory>,
    verifier: SignatureVerifier,
    registry: CenterRegistry,
    session: SessionConfig,
}

impl DistributionService {
    pub fn new(directory: Arc<dyn KeyDirectory>, timeout: Option<Duration>, session: SessionConfig) -> Self {
        Self {
            verifier: SignatureVerifier::new(directory.clone()),
            directory,
            registry: CenterRegistry::new(timeout),
            session,
        }
    }

    pub fn from_config(directory: Arc<dyn KeyDirectory>, config: &RelayConfig) -> Self {
        Self::new(directory, config.center_timeout(), SessionConfig::from(config))
    }

    /// Create a center; the signed body is its local name
    pub async fn publish(&self, identity: &str, authorization: Option<&str>, body: &[u8]) -> Result<CenterId> {
        let owner = self.verifier.verify(identity, body, authorization)?;
        let name = text(body)?;
        self.registry.create(&owner, name).await
    }

    /// Publish `body` to the caller's center `local_name`
    pub async fn send(
        &self,
        identity: &str,
        authorization: Option<&str>,
        local_name: &str,
        body: &[u8],
    ) -> Result<()> {
        let owner = self.verifier.verify(identity, body, authorization)?;
        let message = text(body)?;
        let id = owned_center(owner, local_name)?;
        self.registry.notify(&id, message.to_string()).await
    }

    /// Remove a center; the signed body is its local name
    pub async fn unpublish(&self, identity: &str, authorization: Option<&str>, body: &[u8]) -> Result<()> {
        let owner = self.verifier.verify(identity, body, authorization)?;
        let id = owned_center(owner, text(body)?)?;
        self.registry.remove(&id).await
    }

    /// Last message of the center with wire id `center`
    pub async fn poll(&self, center: &str) -> Result<String> {
        let id = parse_center(center)?;
        self.registry.last_message(&id).await
    }

    /// Last message wrapped as a JSONP call to `callback`
    pub async fn poll_jsonp(&self, center: &str, callback: &str) -> Result<String> {
        if !is_valid_callback(callback) {
            return Err(Error::InvalidCallback(callback.to_string()));
        }
        let message = self.poll(center).await?;
        let literal = serde_json::to_string(&message)
            .map_err(|e| Error::Serialization(format!("Failed to encode message: {}", e)))?;
        Ok(format!("{}({});", callback, literal))
    }

    /// Run a live subscriber session until it ends
    ///
    /// An unknown center closes the outbound side and fails with
    /// [`Error::CenterNotFound`].
    pub async fn attach<O, I>(&self, center: &str, mut outbound: O, inbound: I) -> Result<SessionEnd>
    where
        O: Outbound,
        I: Inbound,
    {
        let hub = match parse_center(center) {
            Ok(id) => self.registry.hub(&id).await,
            Err(e) => Err(e),
        };
        let hub = match hub {
            Ok(hub) => hub,
            Err(e) => {
                outbound.close().await;
                return Err(e);
            }
        };

        Ok(session::run(&hub, &self.session, outbound, inbound).await)
    }

    /// Check a signed request without side effects
    pub fn authenticate(&self, identity: &str, authorization: Option<&str>, body: &[u8]) -> Result<Identity> {
        self.verifier.verify(identity, body, authorization)
    }

    pub async fn contains(&self, center: &str) -> bool {
        match CenterId::parse(center) {
            Some(id) => self.registry.contains(&id).await,
            None => false,
        }
    }

    pub async fn centers(&self) -> Vec<CenterInfo> {
        self.registry.snapshot().await
    }

    pub async fn stats(&self) -> ServiceStats {
        let centers = self.registry.snapshot().await;
        ServiceStats {
            centers: centers.len(),
            sessions: centers.iter().map(|c| c.sessions).sum(),
        }
    }

    /// Retire every center and close the key directory
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
        self.directory.close();
    }
}

fn text(body: &[u8]) -> Result<&str> {
    std::str::from_utf8(body).map_err(|_| Error::InvalidPayload)
}

/// A name that could never have been created cannot name an existing center.
fn owned_center(owner: Identity, local_name: &str) -> Result<CenterId> {
    let display = format!("{}{}{}", owner, CENTER_DELIMITER, local_name);
    CenterId::new(owner, local_name).map_err(|_| Error::CenterNotFound(display))
}

fn parse_center(center: &str) -> Result<CenterId> {
    CenterId::parse(center).ok_or_else(|| Error::CenterNotFound(center.to_string()))
}

fn is_valid_callback(callback: &str) -> bool {
    !callback.is_empty()
        && callback
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$'))
}
