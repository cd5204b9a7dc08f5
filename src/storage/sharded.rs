//! Sharded Storage Engine
//!
//! Instead of one big lock, keys are spread over a fixed table of
//! independent [`MemoryStorage`] shards. Writers on different shards never
//! contend, which bounds contention to the traffic landing on one shard.
//!
//! ## Design Decisions
//!
//! 1. **Fixed table**: The shard count is chosen at construction and never
//!    changes, so a key maps to the same shard for the whole process lifetime.
//! 2. **FNV-1a routing**: A fixed, non-cryptographic 64-bit hash, reduced
//!    modulo the shard count. No rebalancing ever happens.
//! 3. **No global lock**: Multi-key `del` visits each key's shard on its own.
//!    Concurrent observers may see the keys disappear one at a time.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ShardedStorage                          │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::storage::{MemoryStorage, Storage, StorageResult};
use bytes::Bytes;

/// Number of shards for the storage engine.
/// More shards = less lock contention, but more memory overhead.
/// 64 is a good balance for most workloads.
pub const DEFAULT_SHARDS: usize = 64;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a hash of `bytes`.
#[inline]
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// The sharded storage engine.
///
/// This struct is designed to be wrapped in an `Arc` and shared across
/// all connection tasks. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use shardkv::storage::{ShardedStorage, Storage};
/// use bytes::Bytes;
///
/// let engine = ShardedStorage::with_shards(16);
/// engine.set(b"a", b"1");
/// engine.set(b"b", b"2");
/// assert_eq!(engine.del(&[Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]), 2);
/// ```
#[derive(Debug)]
pub struct ShardedStorage {
    shards: Box<[MemoryStorage]>,
}

impl Default for ShardedStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardedStorage {
    /// Creates a storage engine with [`DEFAULT_SHARDS`] shards.
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// Creates a storage engine with `count` shards (at least one).
    pub fn with_shards(count: usize) -> Self {
        let shards = (0..count.max(1)).map(|_| MemoryStorage::new()).collect();
        Self { shards }
    }

    /// Returns the number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Determines which shard a key belongs to.
    #[inline]
    pub fn shard_index(&self, key: &[u8]) -> usize {
        (fnv1a_64(key) % self.shards.len() as u64) as usize
    }

    /// Gets the shard for a given key.
    #[inline]
    fn shard(&self, key: &[u8]) -> &MemoryStorage {
        &self.shards[self.shard_index(key)]
    }

    /// Returns the number of keys across all shards.
    ///
    /// Shards are counted one after another, so the total is only a
    /// snapshot when no writers are active.
    pub fn len(&self) -> usize {
        self.shards.iter().map(MemoryStorage::len).sum()
    }

    /// Returns true if every shard is empty.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(MemoryStorage::is_empty)
    }
}

impl Storage for ShardedStorage {
    fn get(&self, key: &[u8]) -> StorageResult<Bytes> {
        self.shard(key).get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) {
        self.shard(key).set(key, value)
    }

    fn del(&self, keys: &[Bytes]) -> usize {
        keys.iter()
            .map(|key| self.shard(key).del(std::slice::from_ref(key)))
            .sum()
    }

    fn incr(&self, key: &[u8]) -> StorageResult<i64> {
        self.shard(key).incr(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fnv1a_known_vectors() {
        assert_eq!(fnv1a_64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a_64(b"foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn test_routing_is_stable() {
        let engine = ShardedStorage::new();
        assert_eq!(engine.shard_count(), DEFAULT_SHARDS);

        for i in 0..1_000 {
            let key = format!("key:{}", i);
            let index = engine.shard_index(key.as_bytes());
            assert!(index < DEFAULT_SHARDS);
            assert_eq!(index, engine.shard_index(key.as_bytes()));
            assert_eq!(index as u64, fnv1a_64(key.as_bytes()) % 64);
        }
    }

    #[test]
    fn test_keys_spread_over_shards() {
        let engine = ShardedStorage::new();
        for i in 0..10_000 {
            engine.set(format!("key:{}", i).as_bytes(), b"v");
        }

        assert_eq!(engine.len(), 10_000);
        assert!(engine.shards.iter().all(|shard| !shard.is_empty()));
    }

    #[test]
    fn test_zero_shards_clamps_to_one() {
        let engine = ShardedStorage::with_shards(0);
        assert_eq!(engine.shard_count(), 1);

        engine.set(b"key", b"value");
        assert_eq!(engine.get(b"key"), Ok(Bytes::from("value")));
    }

    #[test]
    fn test_set_and_get() {
        let engine = ShardedStorage::new();

        engine.set(b"name", b"Ariz");
        assert_eq!(engine.get(b"name"), Ok(Bytes::from("Ariz")));
        assert_eq!(engine.get(b"nonexistent"), Err(StorageError::NotFound));
    }

    #[test]
    fn test_del_fans_out_across_shards() {
        let engine = ShardedStorage::with_shards(8);
        let keys: Vec<Bytes> = (0..64).map(|i| Bytes::from(format!("k{}", i))).collect();
        for key in keys.iter().step_by(2) {
            engine.set(key, b"v");
        }

        assert_eq!(engine.del(&keys), 32);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_incr() {
        let engine = ShardedStorage::new();

        assert_eq!(engine.incr(b"counter"), Ok(1));
        assert_eq!(engine.incr(b"counter"), Ok(2));

        engine.set(b"counter", b"notanumber");
        assert_eq!(engine.incr(b"counter"), Err(StorageError::NotAnInteger));

        engine.set(b"max", i64::MAX.to_string().as_bytes());
        assert_eq!(engine.incr(b"max"), Err(StorageError::Overflow));
    }

    #[test]
    fn test_concurrent_access() {
        let engine = Arc::new(ShardedStorage::new());
        let mut handles = vec![];

        // Spawn multiple writers
        for i in 0..10 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for j in 0..1_000 {
                    let key = format!("key-{}-{}", i, j);
                    engine.set(key.as_bytes(), key.as_bytes());
                    assert_eq!(engine.get(key.as_bytes()), Ok(Bytes::from(key)));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.len(), 10_000);
    }
}
