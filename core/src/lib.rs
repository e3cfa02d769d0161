//! Beacon Core Library
//!
//! The notification distribution engine behind the Beacon push relay.
//! Publishers sign requests with their Ed25519 key, create notification
//! centers, and publish messages into them; subscribers either poll the last
//! message or attach a live session that receives every broadcast.

pub mod config;
pub mod crypto;
pub mod directory;
pub mod hub;
pub mod registry;
pub mod service;
pub mod session;
pub mod types;
pub mod version;

pub use config::RelayConfig;
pub use directory::{IdentityRecord, KeyDirectory, MemoryDirectory, RocksDirectory};
pub use hub::{Hub, HubStats};
pub use registry::{CenterInfo, CenterRegistry};
pub use service::{DistributionService, ServiceStats};
pub use session::{Inbound, Outbound, SessionConfig, SessionEnd};
pub use types::*;
pub use version::version_string;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Notification center not found: {0}")]
    CenterNotFound(String),

    #[error("Invalid center name: {0}")]
    InvalidCenterName(String),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Identity already registered: {0}")]
    IdentityExists(String),

    #[error("Message body is not valid UTF-8")]
    InvalidPayload,

    #[error("Invalid JSONP callback: {0}")]
    InvalidCallback(String),

    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Transport failed: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
