//! RESP Encoder
//!
//! Serialization is the structural inverse of [`Decoder`](super::Decoder):
//! for every value the encoder accepts, decoding its bytes yields the same
//! value back.
//!
//! Line-framed kinds (simple strings, errors, integers) cannot carry CR or LF
//! in their payload. Such values are rejected with
//! [`EncodeError::UnsupportedType`] instead of being written as a broken frame.

use crate::protocol::types::{prefix, Value, CRLF};
use std::io::{self, Write};
use thiserror::Error;

/// Errors that can occur while encoding a RESP value.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The value has no valid wire representation
    #[error("cannot encode {0}: payload contains CR or LF")]
    UnsupportedType(&'static str),

    /// Transport failure while writing or flushing
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for encoding operations.
pub type EncodeResult<T> = Result<T, EncodeError>;

impl Value {
    /// Serializes the value to bytes for sending over the wire.
    ///
    /// No validation is performed; see [`encode_frame`] for the checked form.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the value into an existing buffer.
    ///
    /// This is more efficient than `serialize()` when you want to reuse a buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Value::SimpleString(s) => write_line(buf, prefix::SIMPLE_STRING, s),
            Value::Error(s) => write_line(buf, prefix::ERROR, s),
            Value::Integer(n) => write_line(buf, prefix::INTEGER, n),
            Value::BulkString(None) => write_line(buf, prefix::BULK_STRING, b"-1"),
            Value::BulkString(Some(data)) => {
                write_line(buf, prefix::BULK_STRING, data.len().to_string().as_bytes());
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            Value::Array(None) => write_line(buf, prefix::ARRAY, b"-1"),
            Value::Array(Some(values)) => {
                write_line(buf, prefix::ARRAY, values.len().to_string().as_bytes());
                for value in values {
                    value.serialize_into(buf);
                }
            }
        }
    }
}

fn write_line(buf: &mut Vec<u8>, tag: u8, content: &[u8]) {
    buf.push(tag);
    buf.extend_from_slice(content);
    buf.extend_from_slice(CRLF);
}

/// Checks that every line-framed payload inside `value` is free of CR/LF.
fn validate(value: &Value) -> EncodeResult<()> {
    let (kind, line) = match value {
        Value::SimpleString(s) => ("simple string", s),
        Value::Error(s) => ("error", s),
        Value::Integer(n) => ("integer", n),
        Value::BulkString(_) | Value::Array(None) => return Ok(()),
        Value::Array(Some(values)) => return values.iter().try_for_each(validate),
    };

    if line.iter().any(|&b| b == b'\r' || b == b'\n') {
        return Err(EncodeError::UnsupportedType(kind));
    }
    Ok(())
}

/// Validates `value` and appends its wire form to `buf`.
///
/// Nothing is appended when validation fails.
pub fn encode_frame(value: &Value, buf: &mut Vec<u8>) -> EncodeResult<()> {
    validate(value)?;
    value.serialize_into(buf);
    Ok(())
}

/// A RESP encoder over a byte sink.
///
/// Each call to [`encode`](Encoder::encode) writes one complete value and
/// flushes the sink before returning.
///
/// # Example
///
/// ```
/// use shardkv::protocol::{Encoder, Value};
///
/// let mut encoder = Encoder::new(Vec::new());
/// encoder.encode(&Value::ok()).unwrap();
/// assert_eq!(encoder.into_inner(), b"+OK\r\n");
/// ```
#[derive(Debug)]
pub struct Encoder<W> {
    writer: W,
    scratch: Vec<u8>,
}

impl<W: Write> Encoder<W> {
    /// Creates an encoder writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            scratch: Vec::with_capacity(256),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Encodes one value, flushes, and returns the number of bytes written.
    pub fn encode(&mut self, value: &Value) -> EncodeResult<usize> {
        self.scratch.clear();
        encode_frame(value, &mut self.scratch)?;
        self.writer.write_all(&self.scratch)?;
        self.writer.flush()?;
        Ok(self.scratch.len())
    }
}
