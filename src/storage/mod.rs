//! Storage subsystem.
//!
//! - [`storage_trait`]: the [`Store`](storage_trait::Store) trait and [`StoreError`](storage_trait::StoreError)
//! - [`mem_store`]: in-memory implementation used as the relay/dedup cache

pub mod mem_store;
pub mod storage_trait;
