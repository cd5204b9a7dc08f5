//! # ShardKV - A Sharded In-Memory Key-Value Server
//!
//! ShardKV speaks the RESP wire protocol and keeps string keys and values
//! in memory. The storage layer comes in two interchangeable forms: a
//! single map behind one lock, and a fixed table of independently locked
//! shards selected by an FNV-1a hash of the key.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              ShardKV                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Executor   │                  │
//! │  │ (Listener)  │    │  Handler    │    │             │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │   RESP      │    │           dyn Storage                        │   │
//! │  │  Decoder /  │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │  │  Encoder    │    │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │   │
//! │  └─────────────┘    │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │   │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     └──────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use shardkv::commands::Executor;
//! use shardkv::connection::{handle_connection, ConnectionConfig, ConnectionStats};
//! use shardkv::storage::ShardedStorage;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let executor = Executor::new(Arc::new(ShardedStorage::new()));
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:6379").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let executor = executor.clone();
//!         let stats = Arc::clone(&stats);
//!
//!         tokio::spawn(handle_connection(
//!             stream,
//!             addr,
//!             executor,
//!             ConnectionConfig::default(),
//!             stats,
//!         ));
//!     }
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING [message]`
//! - `ECHO message`
//! - `SET key value`
//! - `GET key`
//! - `DEL key [key ...]`
//! - `INCR key`
//!
//! Command names are matched case-insensitively.
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP values, stream decoder and encoder
//! - [`storage`]: The `Storage` contract and its two engines
//! - [`commands`]: The executor that maps requests onto storage
//! - [`connection`]: Per-client connection driver

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{ExecError, Executor};
pub use connection::{handle_connection, ConnectionConfig, ConnectionStats};
pub use protocol::{DecodeError, Decoder, EncodeError, Encoder, Value};
pub use storage::{MemoryStorage, ShardedStorage, Storage, StorageError};

/// The default port ShardKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host ShardKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of ShardKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
