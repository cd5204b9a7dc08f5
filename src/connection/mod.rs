//! Connection Handler Module
//!
//! This module drives individual client connections. Each client connection
//! is handled by its own async task, so one slow client never stalls another.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ Decode RESP │───>│  Executor   │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Encode+flush│        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Termination
//!
//! - Malformed framing closes the connection without a reply.
//! - A storage failure is reported as `-ERR <message>` and then the
//!   connection is closed.
//! - Protocol-level mistakes (arity, unknown command) are ordinary error
//!   replies and the connection stays open.
//!
//! ## Example
//!
//! ```ignore
//! use shardkv::commands::Executor;
//! use shardkv::connection::{handle_connection, ConnectionConfig, ConnectionStats};
//! use shardkv::storage::ShardedStorage;
//! use std::sync::Arc;
//!
//! let executor = Executor::new(Arc::new(ShardedStorage::new()));
//! let stats = Arc::new(ConnectionStats::new());
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(
//!     stream,
//!     addr,
//!     executor.clone(),
//!     ConnectionConfig::default(),
//!     stats,
//! ));
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{
    handle_connection, ConnectionConfig, ConnectionError, ConnectionHandler, ConnectionStats,
    DEFAULT_MAX_BUFFER_SIZE,
};
