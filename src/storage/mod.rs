//! Storage Engine Module
//!
//! This module provides the key-value store behind the command executor.
//! Both engines implement the same [`Storage`] contract:
//!
//! - [`MemoryStorage`]: one `HashMap` behind one reader/writer lock
//! - [`ShardedStorage`]: many `MemoryStorage` shards, one lock each
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ShardedStorage                          │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!            ▲ fnv1a_64(key) % shard_count
//! ```
//!
//! ## Guarantees
//!
//! - Operations on one key are linearizable under that key's shard lock
//! - Nothing is atomic across keys; a multi-key `del` on the sharded engine
//!   is a sequence of independent single-key removals
//! - Stored values are never aliased with caller buffers: writes copy the
//!   input and reads hand out immutable `Bytes`
//!
//! ## Example
//!
//! ```
//! use shardkv::storage::{ShardedStorage, Storage, StorageError};
//! use bytes::Bytes;
//!
//! let engine = ShardedStorage::new();
//!
//! engine.set(b"name", b"Ariz");
//! assert_eq!(engine.get(b"name").unwrap(), Bytes::from("Ariz"));
//!
//! assert_eq!(engine.incr(b"hits").unwrap(), 1);
//! assert!(matches!(engine.get(b"missing"), Err(StorageError::NotFound)));
//! ```

pub mod memory;
pub mod sharded;

use bytes::Bytes;
use thiserror::Error;

// Re-export commonly used types
pub use memory::MemoryStorage;
pub use sharded::{fnv1a_64, ShardedStorage, DEFAULT_SHARDS};

/// Errors returned by storage operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The key is absent
    #[error("key not found")]
    NotFound,

    /// The stored value does not parse as a signed 64-bit decimal
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// Incrementing would exceed `i64::MAX`
    #[error("increment would overflow")]
    Overflow,
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// The contract shared by every storage engine.
///
/// Implementations are shared across connection tasks behind an `Arc`,
/// so every method takes `&self` and synchronizes internally.
pub trait Storage: Send + Sync {
    /// Returns the value stored at `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the key is absent.
    fn get(&self, key: &[u8]) -> StorageResult<Bytes>;

    /// Stores a copy of `value` at `key`, replacing any previous value.
    fn set(&self, key: &[u8], value: &[u8]);

    /// Removes every listed key that is present and returns how many were.
    fn del(&self, keys: &[Bytes]) -> usize;

    /// Adds one to the integer stored at `key` and returns the new value.
    ///
    /// An absent key counts as `0`, so the first increment stores `1`.
    ///
    /// # Errors
    ///
    /// - `StorageError::NotAnInteger` if the stored bytes are not a base-10 `i64`
    /// - `StorageError::Overflow` if the stored value is `i64::MAX`
    fn incr(&self, key: &[u8]) -> StorageResult<i64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn engines() -> Vec<(&'static str, Arc<dyn Storage>)> {
        let memory: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let sharded: Arc<dyn Storage> = Arc::new(ShardedStorage::new());
        vec![("memory", memory), ("sharded", sharded)]
    }

    #[test]
    fn test_contract_on_both_engines() {
        for (name, engine) in engines() {
            engine.set(b"foo", b"bar");
            assert_eq!(engine.get(b"foo"), Ok(Bytes::from("bar")), "{name}");
            assert_eq!(engine.get(b"nokey"), Err(StorageError::NotFound), "{name}");

            engine.set(b"a", b"1");
            engine.set(b"c", b"3");
            let keys = [Bytes::from("a"), Bytes::from("b"), Bytes::from("c")];
            assert_eq!(engine.del(&keys), 2, "{name}");
            assert_eq!(engine.del(&[Bytes::from("nokey")]), 0, "{name}");

            assert_eq!(engine.incr(b"counter"), Ok(1), "{name}");
            assert_eq!(engine.incr(b"counter"), Ok(2), "{name}");
            assert_eq!(engine.get(b"counter"), Ok(Bytes::from("2")), "{name}");

            engine.set(b"counter", b"notanumber");
            assert_eq!(engine.incr(b"counter"), Err(StorageError::NotAnInteger), "{name}");
        }
    }

    #[test]
    fn test_writes_do_not_alias_caller_buffers() {
        for (name, engine) in engines() {
            let mut value = b"original".to_vec();
            engine.set(b"key", &value);
            value.copy_from_slice(b"mutated!");
            assert_eq!(engine.get(b"key"), Ok(Bytes::from("original")), "{name}");

            let mut read = engine.get(b"key").unwrap().to_vec();
            read[0] = b'X';
            assert_eq!(engine.get(b"key"), Ok(Bytes::from("original")), "{name}");
        }
    }

    /// Runs the same single-key operation sequence against both engines
    /// and requires identical results at every step.
    #[test]
    fn test_sharded_matches_single_lock() {
        let single = MemoryStorage::new();
        let sharded = ShardedStorage::new();

        // Deterministic LCG so failures are reproducible
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            state >> 33
        };

        for step in 0..20_000 {
            let key = format!("key:{}", next() % 50);
            let key = key.as_bytes();

            match next() % 5 {
                0 => assert_eq!(single.get(key), sharded.get(key), "step {step}"),
                1 => {
                    let value = if next() % 3 == 0 {
                        "text".to_string()
                    } else {
                        (next() % 1000).to_string()
                    };
                    single.set(key, value.as_bytes());
                    sharded.set(key, value.as_bytes());
                }
                2 => {
                    let keys = [Bytes::copy_from_slice(key)];
                    assert_eq!(single.del(&keys), sharded.del(&keys), "step {step}");
                }
                3 => assert_eq!(single.incr(key), sharded.incr(key), "step {step}"),
                _ => {
                    single.set(key, i64::MAX.to_string().as_bytes());
                    sharded.set(key, i64::MAX.to_string().as_bytes());
                    assert_eq!(single.incr(key), Err(StorageError::Overflow));
                    assert_eq!(sharded.incr(key), Err(StorageError::Overflow));
                }
            }
        }

        assert_eq!(single.len(), sharded.len());
    }

    #[test]
    fn test_concurrent_distinct_keys_no_lost_updates() {
        for (name, engine) in engines() {
            let handles: Vec<_> = (0..10)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        for i in 0..1_000 {
                            let key = format!("key-{}-{}", t, i);
                            engine.set(key.as_bytes(), b"first");
                            engine.set(key.as_bytes(), format!("value-{}-{}", t, i).as_bytes());
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            for t in 0..10 {
                for i in 0..1_000 {
                    let key = format!("key-{}-{}", t, i);
                    assert_eq!(
                        engine.get(key.as_bytes()),
                        Ok(Bytes::from(format!("value-{}-{}", t, i))),
                        "{name}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_concurrent_incr_is_atomic() {
        for (name, engine) in engines() {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        for _ in 0..500 {
                            engine.incr(b"shared").unwrap();
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(engine.get(b"shared"), Ok(Bytes::from("4000")), "{name}");
        }
    }
}
