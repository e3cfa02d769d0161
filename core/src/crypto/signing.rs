//! Ed25519 request signing and verification
//!
//! Publishers sign the SHA-256 digest of the exact request body; the
//! signature travels hex-encoded in the `Authorization` header.

use crate::{Error, Result};
use ed25519_dalek::{Signer, SECRET_KEY_LENGTH, SIGNATURE_LENGTH};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::fmt;

/// Ed25519 keypair held by a publisher
#[derive(Clone)]
pub struct Keypair {
    inner: ed25519_dalek::SigningKey,
}

impl Keypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let mut rng = OsRng;
        let inner = ed25519_dalek::SigningKey::generate(&mut rng);
        Self { inner }
    }

    /// Create keypair from secret key bytes
    pub fn from_bytes(bytes: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::from_bytes(bytes),
        }
    }

    /// Parse a hex-encoded secret key
    pub fn from_hex(secret: &str) -> Result<Self> {
        let bytes = decode_fixed::<SECRET_KEY_LENGTH>(secret.trim(), "secret key")?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Get the secret key bytes
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.inner.to_bytes()
    }

    /// Hex-encoded secret key, for key files
    pub fn secret_hex(&self) -> String {
        hex::encode(self.inner.to_bytes())
    }

    /// Get the public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: self.inner.verifying_key(),
        }
    }

    /// Sign a request body, returning the hex signature the server expects
    pub fn sign_request(&self, body: &[u8]) -> String {
        let sig = self.inner.sign(&request_digest(body));
        hex::encode(sig.to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", self.public_key())
    }
}

/// Ed25519 public key registered for an identity
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    inner: ed25519_dalek::VerifyingKey,
}

impl PublicKey {
    /// Create public key from bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let inner = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|e| Error::Crypto(format!("Invalid public key: {}", e)))?;
        Ok(Self { inner })
    }

    /// Parse a hex-encoded public key
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = decode_fixed::<32>(encoded.trim(), "public key")?;
        Self::from_bytes(&bytes)
    }

    /// Get the public key bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Verify a hex signature over a request body
    pub fn verify_request(&self, body: &[u8], signature_hex: &str) -> Result<()> {
        let bytes = decode_fixed::<SIGNATURE_LENGTH>(signature_hex, "signature")
            .map_err(|_| Error::Unauthorized)?;
        let sig = ed25519_dalek::Signature::from_bytes(&bytes);
        self.inner
            .verify_strict(&request_digest(body), &sig)
            .map_err(|_| Error::Unauthorized)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// SHA-256 digest of a raw request body
pub fn request_digest(body: &[u8]) -> [u8; 32] {
    Sha256::digest(body).into()
}

fn decode_fixed<const N: usize>(encoded: &str, what: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(encoded)
        .map_err(|e| Error::Crypto(format!("Invalid {} hex: {}", what, e)))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        Error::Crypto(format!(
            "Invalid {} length: expected {} bytes, got {}",
            what,
            N,
            bytes.len()
        ))
    })
}
