//! Command Execution Module
//!
//! This module implements the command processing layer.
//! It receives decoded requests, executes them against the storage engine,
//! and returns responses.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RESP Decoder   │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Executor     │  (this module)
//! │                 │
//! │  - Validate     │
//! │  - Dispatch     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Storage     │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`, `ECHO`
//! - `SET`, `GET`, `DEL`, `INCR`

pub mod executor;

// Re-export the executor and its error type
pub use executor::{ExecError, ExecResult, Executor};
