//! In-memory key directory

use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::{already_registered, IdentityRecord, KeyDirectory};
use crate::crypto::PublicKey;
use crate::{Identity, Result};

/// Key directory backed by a map; contents vanish with the process
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    records: RwLock<BTreeMap<Identity, IdentityRecord>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyDirectory for MemoryDirectory {
    fn lookup(&self, identity: &Identity) -> Result<Option<PublicKey>> {
        Ok(self.records.read().get(identity).map(|r| r.public_key))
    }

    fn list_all(&self) -> Result<Vec<IdentityRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn add(&self, record: IdentityRecord) -> Result<()> {
        let mut records = self.records.write();
        if records.contains_key(&record.identity) {
            return Err(already_registered(&record.identity));
        }
        records.insert(record.identity.clone(), record);
        Ok(())
    }

    fn remove(&self, identity: &Identity) -> Result<()> {
        self.records.write().remove(identity);
        Ok(())
    }

    fn close(&self) {
        self.records.write().clear();
    }
}
