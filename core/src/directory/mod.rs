//! Key directory - publisher identities and their public keys
//!
//! The distribution engine only ever reads from the directory
//! ([`KeyDirectory::lookup`]); adding and removing identities is an
//! administrative concern driven by the CLI.

pub mod memory;
pub mod rocks;

use serde::{Deserialize, Serialize};

use crate::crypto::{Keypair, PublicKey};
use crate::{Error, Identity, Result};

pub use memory::MemoryDirectory;
pub use rocks::RocksDirectory;

/// A registered publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub identity: Identity,
    pub public_key: PublicKey,
    pub admin: bool,
}

impl IdentityRecord {
    pub fn new(identity: Identity, public_key: PublicKey) -> Self {
        Self {
            identity,
            public_key,
            admin: false,
        }
    }

    /// Mint a fresh keypair for `identity`
    ///
    /// The record goes into the directory; the keypair is handed to the
    /// publisher and never stored server-side.
    pub fn mint(identity: Identity) -> (Self, Keypair) {
        let keypair = Keypair::generate();
        (Self::new(identity, keypair.public_key()), keypair)
    }

    pub(crate) fn to_stored(&self) -> StoredRecord {
        StoredRecord {
            public_key: self.public_key.to_bytes(),
            admin: self.admin,
        }
    }

    pub(crate) fn from_stored(identity: Identity, stored: StoredRecord) -> Result<Self> {
        Ok(Self {
            identity,
            public_key: PublicKey::from_bytes(&stored.public_key)?,
            admin: stored.admin,
        })
    }
}

/// On-disk form of an [`IdentityRecord`], keyed by the mail address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredRecord {
    public_key: [u8; 32],
    admin: bool,
}

/// Storage backend for publisher keys
///
/// Implementations must tolerate concurrent `lookup` calls from many
/// requests. A cache, if any, is the implementation's business and must be
/// invalidated before `remove` returns.
pub trait KeyDirectory: Send + Sync {
    /// Public key registered for `identity`, if any
    fn lookup(&self, identity: &Identity) -> Result<Option<PublicKey>>;

    /// Every registered identity, ordered by mail address
    fn list_all(&self) -> Result<Vec<IdentityRecord>>;

    /// Register a new identity; fails if the mail address is taken
    fn add(&self, record: IdentityRecord) -> Result<()>;

    /// Remove an identity; removing an unknown identity is not an error
    fn remove(&self, identity: &Identity) -> Result<()>;

    /// Release backend resources
    fn close(&self);
}

pub(crate) fn already_registered(identity: &Identity) -> Error {
    Error::IdentityExists(identity.to_string())
}
