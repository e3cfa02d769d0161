//! Request authentication against the key directory

use std::sync::Arc;

use crate::directory::KeyDirectory;
use crate::{Error, Identity, Result};

/// Literal prefix of the `Authorization` header value
pub const AUTH_SCHEME: &str = "Beacon ";

/// Build the `Authorization` header value for a hex signature
pub fn authorization_header(signature_hex: &str) -> String {
    format!("{}{}", AUTH_SCHEME, signature_hex)
}

/// Extract the hex signature from an `Authorization` header value
pub fn parse_authorization(header: &str) -> Option<&str> {
    header.strip_prefix(AUTH_SCHEME).map(str::trim)
}

/// Verifies publish-side requests against the publisher's registered key
///
/// Every failure of the caller's making collapses into
/// [`Error::Unauthorized`] so the response never tells which check failed.
/// Directory failures keep their own error and surface as internal errors.
#[derive(Clone)]
pub struct SignatureVerifier {
    directory: Arc<dyn KeyDirectory>,
}

impl SignatureVerifier {
    pub fn new(directory: Arc<dyn KeyDirectory>) -> Self {
        Self { directory }
    }

    /// Verify `body` was signed by `identity`
    pub fn verify(&self, identity: &str, body: &[u8], authorization: Option<&str>) -> Result<Identity> {
        let identity = Identity::new(identity).map_err(|_| Error::Unauthorized)?;
        let signature = authorization
            .and_then(parse_authorization)
            .ok_or(Error::Unauthorized)?;

        let key = match self.directory.lookup(&identity)? {
            Some(key) => key,
            None => {
                tracing::debug!(identity = %identity, "No key registered for identity");
                return Err(Error::Unauthorized);
            }
        };

        key.verify_request(body, signature).map_err(|e| {
            tracing::debug!(identity = %identity, "Signature rejected");
            e
        })?;

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::directory::{IdentityRecord, MemoryDirectory};

    fn setup() -> (SignatureVerifier, Keypair) {
        let directory = Arc::new(MemoryDirectory::new());
        let keypair = Keypair::generate();
        directory
            .add(IdentityRecord::new(Identity::new("alice@example.com").unwrap(), keypair.public_key()))
            .unwrap();
        (SignatureVerifier::new(directory), keypair)
    }

    #[test]
    fn test_accepts_signed_body() {
        let (verifier, keypair) = setup();
        let header = authorization_header(&keypair.sign_request(b"inbox"));

        let identity = verifier.verify("alice@example.com", b"inbox", Some(&header)).unwrap();
        assert_eq!(identity.as_str(), "alice@example.com");
    }

    #[test]
    fn test_fails_closed() {
        let (verifier, keypair) = setup();
        let header = authorization_header(&keypair.sign_request(b"inbox"));
        let bare = keypair.sign_request(b"inbox");

        let cases: Vec<(&str, &[u8], Option<&str>)> = vec![
            ("", &b"inbox"[..], Some(header.as_str())),
            ("alice@example.com", &b"inbox"[..], None),
            ("alice@example.com", &b"inbox"[..], Some(bare.as_str())),
            ("bob@example.com", &b"inbox"[..], Some(header.as_str())),
            ("alice@example.com", &b"inbox2"[..], Some(header.as_str())),
        ];

        for (identity, body, auth) in cases {
            assert!(
                matches!(verifier.verify(identity, body, auth), Err(Error::Unauthorized)),
                "expected rejection for identity={:?} auth={:?}",
                identity,
                auth
            );
        }
    }

    #[test]
    fn test_parse_authorization() {
        assert_eq!(parse_authorization("Beacon abcd"), Some("abcd"));
        assert_eq!(parse_authorization("Bearer abcd"), None);
        assert_eq!(parse_authorization(""), None);
    }
}
