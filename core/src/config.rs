//! Relay configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Configuration for the relay server
///
/// Loaded from a JSON file. Every field is optional in the file and falls
/// back to its default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayConfig {
    /// Socket address the HTTP server binds to.
    #[serde(default = "default_address")]
    pub address: String,

    /// RocksDB directory holding the key directory.
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// Lifetime of a notification center in seconds; 0 disables expiry.
    #[serde(default)]
    pub timeout_secs: u64,

    /// Cache looked-up public keys in memory.
    #[serde(default = "default_true")]
    pub user_cache: bool,

    /// Capacity of each subscriber's delivery queue.
    #[serde(default = "default_broadcast_buffer")]
    pub broadcast_buffer: usize,

    /// Relay text frames sent by subscribers to everyone on the center.
    #[serde(default)]
    pub allow_incoming: bool,

    /// Raise the default log level to debug.
    #[serde(default)]
    pub extra_logging: bool,

    /// Where `GET /` redirects to, if anywhere.
    #[serde(default)]
    pub redirect_main_page: Option<String>,
}

fn default_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("beacon-keys")
}

fn default_true() -> bool {
    true
}

fn default_broadcast_buffer() -> usize {
    256
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            storage_path: default_storage_path(),
            timeout_secs: 0,
            user_cache: default_true(),
            broadcast_buffer: default_broadcast_buffer(),
            allow_incoming: false,
            extra_logging: false,
            redirect_main_page: None,
        }
    }
}

impl RelayConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    /// Parse configuration from a JSON document
    pub fn from_json(contents: &str) -> Result<Self> {
        let config: RelayConfig = serde_json::from_str(contents)
            .map_err(|e| Error::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.broadcast_buffer == 0 {
            return Err(Error::Config("broadcast_buffer must be > 0".into()));
        }
        if self.address.trim().is_empty() {
            return Err(Error::Config("address must not be empty".into()));
        }
        Ok(())
    }

    /// Center lifetime, or `None` when centers never expire
    pub fn center_timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.address, "0.0.0.0:8080");
        assert_eq!(config.storage_path, PathBuf::from("beacon-keys"));
        assert_eq!(config.broadcast_buffer, 256);
        assert!(config.user_cache);
        assert!(!config.allow_incoming);
        assert_eq!(config.center_timeout(), None);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        assert_eq!(RelayConfig::from_json("{}").unwrap(), RelayConfig::default());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "address": "127.0.0.1:9000",
            "storage_path": "/tmp/beacon-keys",
            "timeout_secs": 3600,
            "user_cache": false,
            "allow_incoming": true,
            "redirect_main_page": "https://example.com"
        }"#;

        let config = RelayConfig::from_json(json).unwrap();
        assert_eq!(config.address, "127.0.0.1:9000");
        assert_eq!(config.storage_path, PathBuf::from("/tmp/beacon-keys"));
        assert_eq!(config.center_timeout(), Some(Duration::from_secs(3600)));
        assert!(!config.user_cache);
        assert!(config.allow_incoming);
        assert_eq!(config.broadcast_buffer, 256);
        assert_eq!(config.redirect_main_page.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let err = RelayConfig::from_json(r#"{"broadcast_buffer": 0}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = RelayConfig::from_file(Path::new("/nonexistent/beacon.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
