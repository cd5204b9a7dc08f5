//! Single-Lock Storage Engine
//!
//! One `HashMap` guarded by one reader/writer lock. Reads share the lock,
//! writes take it exclusively. This is also the building block of every
//! shard in [`ShardedStorage`](super::ShardedStorage).

use crate::storage::{Storage, StorageError, StorageResult};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;

/// A key-value map behind a single `RwLock`.
///
/// The map is owned exclusively by this struct; callers only ever see
/// copies of keys and values.
///
/// # Example
///
/// ```
/// use shardkv::storage::{MemoryStorage, Storage};
///
/// let engine = MemoryStorage::new();
/// engine.set(b"counter", b"41");
/// assert_eq!(engine.incr(b"counter").unwrap(), 42);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<Bytes, Bytes>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys currently stored.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> StorageResult<Bytes> {
        self.data
            .read()
            .get(key)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    fn set(&self, key: &[u8], value: &[u8]) {
        let key = Bytes::copy_from_slice(key);
        let value = Bytes::copy_from_slice(value);
        self.data.write().insert(key, value);
    }

    fn del(&self, keys: &[Bytes]) -> usize {
        let mut data = self.data.write();
        keys.iter()
            .filter(|key| data.remove(&key[..]).is_some())
            .count()
    }

    fn incr(&self, key: &[u8]) -> StorageResult<i64> {
        let mut data = self.data.write();

        match data.get_mut(key) {
            Some(value) => {
                let current = parse_i64(value)?;
                let next = current.checked_add(1).ok_or(StorageError::Overflow)?;
                *value = Bytes::from(next.to_string());
                Ok(next)
            }
            None => {
                data.insert(Bytes::copy_from_slice(key), Bytes::from_static(b"1"));
                Ok(1)
            }
        }
    }
}

/// Parses stored bytes as a base-10 signed 64-bit integer.
fn parse_i64(value: &[u8]) -> StorageResult<i64> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(StorageError::NotAnInteger)
}
