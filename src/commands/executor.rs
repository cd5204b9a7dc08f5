//! Command Executor
//!
//! This module maps decoded requests onto storage operations.
//! A request is an array of bulk strings whose first element names the
//! command (case-insensitive); the rest are its arguments.
//!
//! ## Supported Commands
//!
//! - `PING [message]` - Test connection
//! - `ECHO message` - Echo message
//! - `SET key value` - Set a key
//! - `GET key` - Get a key's value
//! - `DEL key [key ...]` - Delete keys
//! - `INCR key` - Increment integer
//!
//! ## Error Semantics
//!
//! Malformed requests, unknown commands and wrong arity produce an error
//! [`Value`] and the connection stays usable. Storage failures (missing key,
//! non-integer value, overflow) are returned as [`ExecError`] and are fatal
//! to the connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Executor                             │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │  validate   │───>│  dispatch() │───>│   cmd_*()   │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                          dyn Storage        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::protocol::Value;
use crate::storage::{Storage, StorageError};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

/// Fatal outcome of a command; the connection must be closed after reporting it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// The storage engine rejected the operation
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for command execution.
pub type ExecResult = Result<Value, ExecError>;

/// Executes commands against a shared storage engine.
///
/// The executor holds no per-connection state, so one instance can be
/// cloned into every connection task.
#[derive(Clone)]
pub struct Executor {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").finish_non_exhaustive()
    }
}

impl Executor {
    /// Creates a new executor over the given storage engine.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Executes a request and returns the response.
    ///
    /// # Arguments
    ///
    /// * `request` - The decoded request (should be an array of bulk strings)
    ///
    /// # Errors
    ///
    /// Returns `ExecError` when the storage engine fails. Every other
    /// problem is reported as an error `Value` in the `Ok` branch.
    pub fn execute(&self, request: Value) -> ExecResult {
        let args = match request {
            Value::Array(Some(args)) => args,
            Value::Array(None) => Vec::new(),
            _ => return Ok(Value::error("ERR expected array")),
        };

        if args.is_empty() {
            return Ok(Value::error("ERR empty command"));
        }

        let Some(parts) = args
            .iter()
            .map(|arg| arg.as_bulk().cloned())
            .collect::<Option<Vec<Bytes>>>()
        else {
            return Ok(Value::error("ERR expected array of bulk strings"));
        };

        self.dispatch(&parts[0], &parts[1..])
    }

    /// Dispatches a command to its handler.
    fn dispatch(&self, name: &Bytes, args: &[Bytes]) -> ExecResult {
        match name.to_ascii_uppercase().as_slice() {
            b"PING" => Ok(self.cmd_ping(args)),
            b"ECHO" => Ok(self.cmd_echo(args)),
            b"SET" => self.cmd_set(args),
            b"GET" => self.cmd_get(args),
            b"DEL" => self.cmd_del(args),
            b"INCR" => self.cmd_incr(args),
            _ => Ok(Value::error(format!(
                "ERR unknown command '{}'",
                printable(name)
            ))),
        }
    }

    /// PING [message]
    fn cmd_ping(&self, args: &[Bytes]) -> Value {
        match args {
            [] => Value::pong(),
            [message] => Value::bulk_string(message.clone()),
            _ => wrong_arity("ping"),
        }
    }

    /// ECHO message
    fn cmd_echo(&self, args: &[Bytes]) -> Value {
        match args {
            [message] => Value::bulk_string(message.clone()),
            _ => wrong_arity("echo"),
        }
    }

    /// SET key value
    fn cmd_set(&self, args: &[Bytes]) -> ExecResult {
        let [key, value] = args else {
            return Ok(wrong_arity("set"));
        };

        self.storage.set(key, value);
        Ok(Value::ok())
    }

    /// GET key
    fn cmd_get(&self, args: &[Bytes]) -> ExecResult {
        let [key] = args else {
            return Ok(wrong_arity("get"));
        };

        Ok(Value::bulk_string(self.storage.get(key)?))
    }

    /// DEL key [key ...]
    fn cmd_del(&self, args: &[Bytes]) -> ExecResult {
        if args.is_empty() {
            return Ok(wrong_arity("del"));
        }

        let removed = self.storage.del(args);
        Ok(Value::integer(removed as i64))
    }

    /// INCR key
    fn cmd_incr(&self, args: &[Bytes]) -> ExecResult {
        let [key] = args else {
            return Ok(wrong_arity("incr"));
        };

        Ok(Value::integer(self.storage.incr(key)?))
    }
}

fn wrong_arity(command: &str) -> Value {
    Value::error(format!(
        "ERR wrong number of arguments for '{}' command",
        command
    ))
}

/// Renders client-supplied bytes for an error line; CR and LF would break framing.
fn printable(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace(['\r', '\n'], " ")
}
