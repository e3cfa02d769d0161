//! Cryptographic primitives module
//!
//! This module provides:
//! - Ed25519 request signing and verification over SHA-256 body digests
//! - Key generation and hex encoding for key files
//! - The `Authorization` header scheme and the request verifier

pub mod signing;
pub mod verifier;

pub use signing::{request_digest, Keypair, PublicKey};
pub use verifier::{authorization_header, parse_authorization, SignatureVerifier, AUTH_SCHEME};
