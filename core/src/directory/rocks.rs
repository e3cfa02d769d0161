//! RocksDB-based persistent key directory

use parking_lot::RwLock;
use rocksdb::{IteratorMode, Options, DB};
use std::collections::HashMap;
use std::path::Path;

use super::{already_registered, IdentityRecord, KeyDirectory, StoredRecord};
use crate::crypto::PublicKey;
use crate::{Error, Identity, Result};

const IDENTITY_PREFIX: &[u8] = b"identity:";

/// Key directory persisted in RocksDB, with an optional read-through cache
pub struct RocksDirectory {
    db: RwLock<Option<DB>>,
    cache: Option<RwLock<HashMap<Identity, PublicKey>>>,
    write_lock: parking_lot::Mutex<()>,
}

impl RocksDirectory {
    /// Open or create a directory at the given path
    pub fn open<P: AsRef<Path>>(path: P, enable_cache: bool) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        Ok(Self {
            db: RwLock::new(Some(db)),
            cache: enable_cache.then(|| RwLock::new(HashMap::new())),
            write_lock: parking_lot::Mutex::new(()),
        })
    }

    fn with_db<T>(&self, f: impl FnOnce(&DB) -> Result<T>) -> Result<T> {
        let guard = self.db.read();
        let db = guard
            .as_ref()
            .ok_or_else(|| Error::Storage("Directory is closed".to_string()))?;
        f(db)
    }

    fn load(&self, identity: &Identity) -> Result<Option<IdentityRecord>> {
        let value = self.with_db(|db| {
            db.get(identity_key(identity))
                .map_err(|e| Error::Storage(format!("Failed to get identity: {}", e)))
        })?;

        match value {
            Some(bytes) => {
                let stored: StoredRecord = bincode::deserialize(&bytes)
                    .map_err(|e| Error::Serialization(format!("Failed to decode identity: {}", e)))?;
                Ok(Some(IdentityRecord::from_stored(identity.clone(), stored)?))
            }
            None => Ok(None),
        }
    }
}

impl KeyDirectory for RocksDirectory {
    fn lookup(&self, identity: &Identity) -> Result<Option<PublicKey>> {
        if let Some(cache) = &self.cache {
            if let Some(key) = cache.read().get(identity) {
                return Ok(Some(*key));
            }
        }

        let Some(cache) = &self.cache else {
            return Ok(self.load(identity)?.map(|record| record.public_key));
        };

        // The read and the fill happen under the writer lock so a concurrent
        // `remove` cannot be overwritten by a stale key.
        let _writer = self.write_lock.lock();
        let key = self.load(identity)?.map(|record| record.public_key);

        // Misses are not cached so a later `add` is seen immediately.
        if let Some(key) = key {
            cache.write().insert(identity.clone(), key);
        }
        Ok(key)
    }

    fn list_all(&self) -> Result<Vec<IdentityRecord>> {
        self.with_db(|db| {
            let mut records = Vec::new();
            let iter = db.iterator(IteratorMode::From(IDENTITY_PREFIX, rocksdb::Direction::Forward));

            for item in iter {
                let (key, value) = item
                    .map_err(|e| Error::Storage(format!("Iterator error: {}", e)))?;

                // Stop once we've moved past the identity prefix
                if !key.starts_with(IDENTITY_PREFIX) {
                    break;
                }

                let mail = String::from_utf8(key[IDENTITY_PREFIX.len()..].to_vec())
                    .map_err(|e| Error::Serialization(format!("Invalid identity key: {}", e)))?;
                let stored: StoredRecord = bincode::deserialize(&value)
                    .map_err(|e| Error::Serialization(format!("Failed to decode identity: {}", e)))?;
                records.push(IdentityRecord::from_stored(Identity::new(mail)?, stored)?);
            }

            Ok(records)
        })
    }

    fn add(&self, record: IdentityRecord) -> Result<()> {
        let _writer = self.write_lock.lock();
        if self.load(&record.identity)?.is_some() {
            return Err(already_registered(&record.identity));
        }

        let value = bincode::serialize(&record.to_stored())
            .map_err(|e| Error::Serialization(format!("Failed to encode identity: {}", e)))?;
        self.with_db(|db| {
            db.put(identity_key(&record.identity), value)
                .map_err(|e| Error::Storage(format!("Failed to store identity: {}", e)))
        })?;

        tracing::info!(identity = %record.identity, admin = record.admin, "Registered identity");
        Ok(())
    }

    fn remove(&self, identity: &Identity) -> Result<()> {
        let _writer = self.write_lock.lock();
        if let Some(cache) = &self.cache {
            cache.write().remove(identity);
        }

        self.with_db(|db| {
            db.delete(identity_key(identity))
                .map_err(|e| Error::Storage(format!("Failed to delete identity: {}", e)))
        })?;

        tracing::info!(identity = %identity, "Removed identity");
        Ok(())
    }

    fn close(&self) {
        if let Some(cache) = &self.cache {
            cache.write().clear();
        }
        // Dropping the handle flushes and releases the database lock.
        self.db.write().take();
    }
}

fn identity_key(identity: &Identity) -> Vec<u8> {
    let mut key = IDENTITY_PREFIX.to_vec();
    key.extend_from_slice(identity.as_str().as_bytes());
    key
}
