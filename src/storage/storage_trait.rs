//! Key-value storage abstraction used by the relay cache.

use thiserror::Error;

/// Errors that can occur while interacting with a store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No value is stored under the requested key.
    #[error("key {0} not found")]
    NotFound(String),
}

/// Byte-keyed storage shared between concurrent tasks.
///
/// Keys and values are copied in and out; callers never observe a partially
/// written entry.
pub trait Store: Send + Sync {
    /// Returns `true` if a value is stored under `key`.
    fn has(&self, key: &[u8]) -> bool;

    /// Stores `value` under `key`, overwriting any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Returns a copy of the value stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError>;

    /// Number of stored entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
