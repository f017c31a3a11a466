//! In-memory [`Store`] backed by a hash map.

use crate::storage::storage_trait::{Store, StoreError};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe in-memory store.
///
/// Reads share the lock; writes are exclusive. Entries are never evicted.
#[derive(Default)]
pub struct MemStore {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Vec<u8>, Vec<u8>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Vec<u8>, Vec<u8>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for MemStore {
    fn has(&self, key: &[u8]) -> bool {
        self.read().contains_key(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        self.read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(hex::encode(key)))
    }

    fn len(&self) -> usize {
        self.read().len()
    }
}
