//! RESP (Redis Serialization Protocol) Data Types
//!
//! This module defines the value model shared by the decoder, the encoder
//! and the command executor.
//!
//! ## Protocol Format
//!
//! Each RESP type starts with a type prefix byte:
//! - `+` Simple String
//! - `-` Error
//! - `:` Integer
//! - `$` Bulk String
//! - `*` Array
//!
//! All lines are terminated with CRLF (`\r\n`).
//!
//! ## Examples
//!
//! Simple String: `+OK\r\n`
//! Error: `-ERR unknown command\r\n`
//! Integer: `:1000\r\n`
//! Bulk String: `$5\r\nhello\r\n`
//! Array: `*2\r\n$3\r\nGET\r\n$4\r\nname\r\n`
//! Null Bulk String: `$-1\r\n`
//! Null Array: `*-1\r\n`

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// Represents a value in the RESP protocol.
///
/// Payloads are kept as raw bytes. Integers travel as their ASCII text and
/// are never validated here; numeric meaning belongs to the storage layer.
///
/// Null and empty are distinct states for both bulk strings and arrays:
/// `BulkString(None)` is `$-1\r\n` while `BulkString(Some(Bytes::new()))`
/// is `$0\r\n\r\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Status line without embedded CR/LF.
    /// Format: `+<string>\r\n`
    SimpleString(Bytes),

    /// Same shape as a simple string, but signals an error.
    /// Format: `-<error message>\r\n`
    Error(Bytes),

    /// Signed decimal integer rendered as text.
    /// Format: `:<integer>\r\n`
    Integer(Bytes),

    /// Binary-safe string, or null.
    /// Format: `$<length>\r\n<data>\r\n`
    /// Null bulk string: `$-1\r\n`
    BulkString(Option<Bytes>),

    /// Ordered sequence of values, or null.
    /// Format: `*<count>\r\n<element1><element2>...`
    /// Null array: `*-1\r\n`
    Array(Option<Vec<Value>>),
}

impl Value {
    /// Creates a new simple string.
    ///
    /// # Example
    /// ```
    /// use shardkv::protocol::Value;
    /// let ok = Value::simple_string("OK");
    /// assert_eq!(ok.serialize(), b"+OK\r\n");
    /// ```
    pub fn simple_string(s: impl Into<Bytes>) -> Self {
        Value::SimpleString(s.into())
    }

    /// Creates a new error value.
    ///
    /// # Example
    /// ```
    /// use shardkv::protocol::Value;
    /// let err = Value::error("ERR unknown command 'foo'");
    /// assert!(err.is_error());
    /// ```
    pub fn error(s: impl Into<Bytes>) -> Self {
        Value::Error(s.into())
    }

    /// Creates an integer value from a native integer.
    pub fn integer(n: i64) -> Self {
        Value::Integer(Bytes::from(n.to_string()))
    }

    /// Creates a non-null bulk string.
    ///
    /// # Example
    /// ```
    /// use shardkv::protocol::Value;
    /// use bytes::Bytes;
    /// let bulk = Value::bulk_string(Bytes::from("hello"));
    /// assert_eq!(bulk.serialize(), b"$5\r\nhello\r\n");
    /// ```
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        Value::BulkString(Some(data.into()))
    }

    /// Creates the null bulk string (`$-1\r\n`).
    pub fn null_bulk() -> Self {
        Value::BulkString(None)
    }

    /// Creates a non-null array.
    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(Some(values))
    }

    /// Creates the null array (`*-1\r\n`).
    pub fn null_array() -> Self {
        Value::Array(None)
    }

    /// Common response for successful operations
    pub fn ok() -> Self {
        Value::simple_string("OK")
    }

    /// Reply to a bare `PING`
    pub fn pong() -> Self {
        Value::simple_string("pong")
    }

    /// Returns true for a null bulk string or a null array.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::BulkString(None) | Value::Array(None))
    }

    /// Returns true if this value is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Returns the bytes of a non-null bulk string.
    pub fn as_bulk(&self) -> Option<&Bytes> {
        match self {
            Value::BulkString(Some(b)) => Some(b),
            _ => None,
        }
    }

    /// Parses the text of an Integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => std::str::from_utf8(n).ok()?.parse().ok(),
            _ => None,
        }
    }

    /// Attempts to extract the inner array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(Some(arr)) => Some(arr),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::SimpleString(s) => write!(f, "{}", String::from_utf8_lossy(s)),
            Value::Error(s) => write!(f, "(error) {}", String::from_utf8_lossy(s)),
            Value::Integer(n) => write!(f, "(integer) {}", String::from_utf8_lossy(n)),
            Value::BulkString(None) | Value::Array(None) => write!(f, "(nil)"),
            Value::BulkString(Some(data)) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            Value::Array(Some(values)) => {
                if values.is_empty() {
                    write!(f, "(empty array)")
                } else {
                    for (i, v) in values.iter().enumerate() {
                        if i > 0 {
                            writeln!(f)?;
                        }
                        write!(f, "{}) {}", i + 1, v)?;
                    }
                    Ok(())
                }
            }
        }
    }
}
