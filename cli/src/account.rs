//! Key files - a publisher's mail address and private key on disk

use anyhow::{Context, Result};
use beacon_core::crypto::Keypair;
use beacon_core::Identity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct KeyFileContents {
    /// Identity the key is registered under
    mail: String,
    /// Ed25519 secret key, hex encoded
    private_key: String,
}

/// A publisher's credentials
pub struct KeyFile {
    path: PathBuf,
    identity: Identity,
    keypair: Keypair,
}

impl KeyFile {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("Failed to read key file: {}", path.display()))?;

        let contents: KeyFileContents = serde_json::from_slice(&data)
            .context("Failed to parse key file")?;

        let identity = Identity::new(contents.mail).context("Key file has no mail address")?;
        let keypair = Keypair::from_hex(&contents.private_key)
            .context("Key file holds an invalid private key")?;

        Ok(Self {
            path: path.to_path_buf(),
            identity,
            keypair,
        })
    }

    /// Write `keypair` for `identity` to `path`, refusing to overwrite
    pub fn create(path: &Path, identity: Identity, keypair: Keypair) -> Result<Self> {
        if path.exists() {
            anyhow::bail!("Key file already exists: {}", path.display());
        }

        let contents = KeyFileContents {
            mail: identity.to_string(),
            private_key: keypair.secret_hex(),
        };
        let json = serde_json::to_string_pretty(&contents)?;

        // Create parent directory if needed
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, json)
            .with_context(|| format!("Failed to write key file: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            identity,
            keypair,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}
