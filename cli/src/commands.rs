//! Command implementations

use anyhow::{Context, Result};
use beacon_core::crypto::{authorization_header, PublicKey};
use beacon_core::{Identity, IdentityRecord, KeyDirectory, RocksDirectory};
use reqwest::header::AUTHORIZATION;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::account::KeyFile;
use crate::ui;

/// Generate a keypair and write it to a key file
pub fn keygen(mail: &str, out: &Path) -> Result<()> {
    let identity = Identity::new(mail)?;
    let (record, keypair) = IdentityRecord::mint(identity.clone());
    let key_file = KeyFile::create(out, identity, keypair)?;

    ui::print_success(&format!("Wrote key for {} to {}", key_file.identity(), key_file.path().display()));
    ui::print_info(&format!("Public key: {}", record.public_key.to_hex()));
    Ok(())
}

/// Print the `Authorization` header value for `body`
pub fn sign(key: &Path, body: &str) -> Result<()> {
    let key_file = KeyFile::load(key)?;
    println!("{}", authorization_header(&key_file.keypair().sign_request(body.as_bytes())));
    Ok(())
}

/// Identity to register: an existing public key, or a freshly minted one
pub enum NewIdentity {
    PublicKey(String),
    Mint { out: PathBuf },
}

pub struct DirectoryAdmin {
    directory: RocksDirectory,
}

impl DirectoryAdmin {
    pub fn open(store: &Path) -> Result<Self> {
        let directory = RocksDirectory::open(store, false)
            .with_context(|| format!("Failed to open key directory {} (is the server running?)", store.display()))?;
        Ok(Self { directory })
    }

    pub fn add(&self, mail: &str, admin: bool, source: NewIdentity) -> Result<()> {
        let identity = Identity::new(mail)?;

        let mut record = match source {
            NewIdentity::PublicKey(hex) => {
                let key = PublicKey::from_hex(&hex).context("Invalid public key")?;
                IdentityRecord::new(identity, key)
            }
            NewIdentity::Mint { out } => {
                let (record, keypair) = IdentityRecord::mint(identity.clone());
                let key_file = KeyFile::create(&out, identity, keypair)?;
                ui::print_info(&format!("Private key saved to {}", key_file.path().display()));
                record
            }
        };
        record.admin = admin;

        let mail = record.identity.to_string();
        self.directory.add(record)?;
        ui::print_success(&format!("Registered {}", mail));
        Ok(())
    }

    pub fn remove(&self, mail: &str) -> Result<()> {
        let identity = Identity::new(mail)?;
        if self.directory.lookup(&identity)?.is_none() {
            ui::print_warning(&format!("{} is not registered", identity));
            return Ok(());
        }
        self.directory.remove(&identity)?;
        ui::print_success(&format!("Removed {}", identity));
        Ok(())
    }

    pub fn list(&self) -> Result<()> {
        ui::print_identities(&self.directory.list_all()?);
        Ok(())
    }
}

impl Drop for DirectoryAdmin {
    fn drop(&mut self) {
        self.directory.close();
    }
}

/// Publisher client for a running relay
pub struct PushClient {
    http: reqwest::Client,
    server: String,
}

/// Response of the relay
#[derive(Debug)]
pub struct PushResponse {
    pub status: u16,
    pub body: String,
}

impl PushClient {
    pub fn new(server: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            server: server.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.server, path)
    }

    async fn signed_post(&self, key: &KeyFile, path: &str, query: &[(&str, &str)], body: &str) -> Result<PushResponse> {
        let signature = key.keypair().sign_request(body.as_bytes());
        debug!(path, body, signature = %signature, "Sending signed request");

        let response = self
            .http
            .post(self.endpoint(path))
            .query(&[("mail", key.identity().as_str())])
            .query(query)
            .header(AUTHORIZATION, authorization_header(&signature))
            .body(body.to_string())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.server))?;

        read_response(response).await
    }

    pub async fn new_center(&self, key: &KeyFile, name: &str) -> Result<PushResponse> {
        self.signed_post(key, "newcenter", &[], name).await
    }

    pub async fn notify(&self, key: &KeyFile, name: &str, message: &str) -> Result<PushResponse> {
        self.signed_post(key, "notify", &[("center", name)], message).await
    }

    pub async fn remove_center(&self, key: &KeyFile, name: &str) -> Result<PushResponse> {
        self.signed_post(key, "removecenter", &[], name).await
    }

    pub async fn test(&self, key: &KeyFile, message: &str) -> Result<PushResponse> {
        self.signed_post(key, "test", &[], message).await
    }

    pub async fn ping(&self, center: &str) -> Result<PushResponse> {
        let response = self
            .http
            .get(self.endpoint("ping"))
            .query(&[("center", center)])
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.server))?;

        read_response(response).await
    }
}

async fn read_response(response: reqwest::Response) -> Result<PushResponse> {
    let status = response.status().as_u16();
    let body = response.text().await.context("Failed to read response body")?;
    Ok(PushResponse { status, body })
}
