//! RESP Stream Decoder
//!
//! The decoder pulls exactly one value at a time from any [`BufRead`] source.
//! It never reads past the last byte of the value it returns, so a decoder
//! reused across calls stays aligned on pipelined requests.
//!
//! ## How the Decoder Works
//!
//! 1. Read the one-byte type prefix
//! 2. For `+`, `-`, `:` read one CRLF-terminated line
//! 3. For `$` read a length line, then exactly that many bytes plus CRLF
//! 4. For `*` read a count line, then recursively decode each element
//!
//! Every failure aborts the whole value; no partial array is ever returned.
//! Length lines must be canonical (`3`, `-1`, never `+3` or `03`) and a bare
//! CR inside a line is a framing error, so every accepted frame re-encodes
//! to exactly the bytes it was decoded from.
//!
//! ## Buffered Input
//!
//! [`parse_frame`] runs the same decoder over an in-memory buffer and reports
//! how many bytes the value occupied. Running out of bytes mid-value yields
//! `Ok(None)` instead of an error. Before decoding, the frame's structure
//! is walked over the buffer (bulk payloads are skipped, not copied), so a
//! large value arriving over many reads is copied only once it is complete.
//! This lets the connection driver:
//! 1. Append incoming network data to a buffer
//! 2. Call `parse_frame()` to attempt decoding
//! 3. If successful, advance the buffer by `consumed` bytes
//! 4. If incomplete, wait for more data
//! 5. If error, disconnect the client

use crate::protocol::types::{prefix, Value};
use bytes::Bytes;
use std::io::{self, BufRead, Read};
use thiserror::Error;

/// Maximum length of a single line, terminator included (64 KB)
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Maximum number of elements in one array
pub const MAX_ARRAY_LEN: usize = 100_000;

/// Maximum array nesting depth (prevent stack overflow)
pub const MAX_NESTING_DEPTH: usize = 32;

/// Errors that can occur while decoding a RESP value.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The stream ended before a complete value was read
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// Missing CRLF, malformed length line or oversized line
    #[error("framing error: {0}")]
    Framing(String),

    /// Negative length other than -1
    #[error("invalid {kind} length: {len}")]
    InvalidLength { kind: &'static str, len: i64 },

    /// A declared size is above the configured maximum
    #[error("{kind} too large: {size} (max: {max})")]
    LimitExceeded {
        kind: &'static str,
        size: i64,
        max: usize,
    },

    /// Unknown type prefix byte
    #[error("unknown type prefix: {0:#04x}")]
    UnknownType(u8),

    /// Transport failure while reading
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::UnexpectedEof
        } else {
            DecodeError::Io(err)
        }
    }
}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Size limits enforced while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderLimits {
    /// Longest accepted line, CR included
    pub max_line_len: usize,
    /// Largest accepted bulk string payload
    pub max_bulk_len: usize,
    /// Largest accepted array element count
    pub max_array_len: usize,
    /// Deepest accepted array nesting
    pub max_depth: usize,
}

impl Default for DecoderLimits {
    fn default() -> Self {
        Self {
            max_line_len: MAX_LINE_LEN,
            max_bulk_len: MAX_BULK_LEN,
            max_array_len: MAX_ARRAY_LEN,
            max_depth: MAX_NESTING_DEPTH,
        }
    }
}

/// A RESP decoder over a buffered byte stream.
///
/// # Example
///
/// ```
/// use shardkv::protocol::{Decoder, Value};
///
/// let mut decoder = Decoder::new(&b"+OK\r\n:1\r\n"[..]);
/// assert_eq!(decoder.decode().unwrap(), Value::ok());
/// assert_eq!(decoder.decode().unwrap(), Value::integer(1));
/// ```
#[derive(Debug)]
pub struct Decoder<R> {
    reader: R,
    limits: DecoderLimits,
}

impl<R: BufRead> Decoder<R> {
    /// Creates a decoder with the default limits.
    pub fn new(reader: R) -> Self {
        Self::with_limits(reader, DecoderLimits::default())
    }

    /// Creates a decoder with custom limits.
    pub fn with_limits(reader: R, limits: DecoderLimits) -> Self {
        Self { reader, limits }
    }

    /// Returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Decodes exactly one value from the stream.
    pub fn decode(&mut self) -> DecodeResult<Value> {
        self.decode_value(0)
    }

    fn decode_value(&mut self, depth: usize) -> DecodeResult<Value> {
        match self.read_byte()? {
            prefix::SIMPLE_STRING => Ok(Value::SimpleString(self.read_line()?.into())),
            prefix::ERROR => Ok(Value::Error(self.read_line()?.into())),
            prefix::INTEGER => Ok(Value::Integer(self.read_line()?.into())),
            prefix::BULK_STRING => self.decode_bulk_string(),
            prefix::ARRAY => self.decode_array(depth),
            other => Err(DecodeError::UnknownType(other)),
        }
    }

    /// Decodes a bulk string body: `<length>\r\n<data>\r\n`
    fn decode_bulk_string(&mut self) -> DecodeResult<Value> {
        let length = self.read_length()?;

        if length == -1 {
            return Ok(Value::BulkString(None));
        }
        if length < -1 {
            return Err(DecodeError::InvalidLength {
                kind: "bulk string",
                len: length,
            });
        }
        if length > self.limits.max_bulk_len as i64 {
            return Err(DecodeError::LimitExceeded {
                kind: "bulk string",
                size: length,
                max: self.limits.max_bulk_len,
            });
        }

        // Grow with the data actually present rather than the declared length
        let length = length as usize;
        let mut data = Vec::new();
        Read::by_ref(&mut self.reader)
            .take(length as u64)
            .read_to_end(&mut data)?;
        if data.len() < length {
            return Err(DecodeError::UnexpectedEof);
        }

        if self.read_byte()? != b'\r' || self.read_byte()? != b'\n' {
            return Err(DecodeError::Framing(
                "expected CRLF after bulk string data".to_string(),
            ));
        }

        Ok(Value::BulkString(Some(Bytes::from(data))))
    }

    /// Decodes an array body: `<count>\r\n<elements...>`
    fn decode_array(&mut self, depth: usize) -> DecodeResult<Value> {
        let count = self.read_length()?;

        if count == -1 {
            return Ok(Value::Array(None));
        }
        if count < -1 {
            return Err(DecodeError::InvalidLength {
                kind: "array",
                len: count,
            });
        }
        if count > self.limits.max_array_len as i64 {
            return Err(DecodeError::LimitExceeded {
                kind: "array",
                size: count,
                max: self.limits.max_array_len,
            });
        }
        if depth >= self.limits.max_depth {
            return Err(DecodeError::LimitExceeded {
                kind: "array nesting",
                size: depth as i64 + 1,
                max: self.limits.max_depth,
            });
        }

        let count = count as usize;
        let mut elements = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            elements.push(self.decode_value(depth + 1)?);
        }

        Ok(Value::Array(Some(elements)))
    }

    /// Reads a length line and parses it as a signed decimal integer.
    fn read_length(&mut self) -> DecodeResult<i64> {
        let line = self.read_line()?;
        parse_length(&line).ok_or_else(|| {
                DecodeError::Framing(format!(
                    "invalid length line: {:?}",
                    String::from_utf8_lossy(&line)
                ))
            })
    }

    /// Reads one line and strips its CRLF terminator.
    fn read_line(&mut self) -> DecodeResult<Vec<u8>> {
        let mut line = Vec::with_capacity(64);

        loop {
            let available = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if available.is_empty() {
                return Err(DecodeError::UnexpectedEof);
            }

            let found = match available.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    line.extend_from_slice(&available[..pos]);
                    self.reader.consume(pos + 1);
                    true
                }
                None => {
                    let n = available.len();
                    line.extend_from_slice(available);
                    self.reader.consume(n);
                    false
                }
            };

            if line.len() > self.limits.max_line_len {
                return Err(DecodeError::Framing(format!(
                    "line exceeds maximum length of {} bytes",
                    self.limits.max_line_len
                )));
            }
            if found {
                break;
            }
        }

        if line.pop() != Some(b'\r') {
            return Err(DecodeError::Framing(
                "expected CRLF line terminator".to_string(),
            ));
        }
        if line.contains(&b'\r') {
            return Err(DecodeError::Framing("bare CR inside line".to_string()));
        }
        Ok(line)
    }

    fn read_byte(&mut self) -> DecodeResult<u8> {
        let mut byte = [0u8; 1];
        self.reader.read_exact(&mut byte)?;
        Ok(byte[0])
    }
}

/// Decodes one value from the front of `buf`.
///
/// # Returns
///
/// - `Ok(Some((value, consumed)))` - A complete value occupied `consumed` bytes
/// - `Ok(None)` - The buffer holds only a prefix of a value
/// - `Err(e)` - The bytes can never form a valid value
pub fn parse_frame(buf: &[u8], limits: DecoderLimits) -> DecodeResult<Option<(Value, usize)>> {
    // Nothing is copied until the whole frame is buffered
    if let Scan::Incomplete = scan_value(buf, 0, 0, &limits) {
        return Ok(None);
    }

    let mut decoder = Decoder::with_limits(buf, limits);
    match decoder.decode() {
        Ok(value) => Ok(Some((value, buf.len() - decoder.reader.len()))),
        Err(DecodeError::UnexpectedEof) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parses a length line in canonical form: `0`, or an optional `-` then
/// digits without a leading zero. `+3` and `03` are rejected so that every
/// accepted frame re-encodes to the same bytes.
fn parse_length(line: &[u8]) -> Option<i64> {
    let digits = line.strip_prefix(b"-").unwrap_or(line);
    let canonical = match digits {
        b"0" => digits.len() == line.len(),
        [first, rest @ ..] => {
            (b'1'..=b'9').contains(first) && rest.iter().all(u8::is_ascii_digit)
        }
        [] => false,
    };
    if !canonical {
        return None;
    }
    std::str::from_utf8(line).ok()?.parse().ok()
}

/// Outcome of walking a frame's structure without copying its payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// The value ends just before this offset
    Complete(usize),
    /// The buffer ends before the value does
    Incomplete,
    /// The bytes are malformed; the decoder reports the precise error
    Invalid,
}

/// Walks the value starting at `pos`, jumping over bulk payloads.
fn scan_value(buf: &[u8], pos: usize, depth: usize, limits: &DecoderLimits) -> Scan {
    let Some(&tag) = buf.get(pos) else {
        return Scan::Incomplete;
    };

    match tag {
        prefix::SIMPLE_STRING | prefix::ERROR | prefix::INTEGER => {
            match scan_line(buf, pos + 1, limits) {
                Ok((_, end)) => Scan::Complete(end),
                Err(scan) => scan,
            }
        }
        prefix::BULK_STRING => {
            let (len, body) = match scan_length(buf, pos + 1, limits) {
                Ok(found) => found,
                Err(scan) => return scan,
            };
            if len == -1 {
                return Scan::Complete(body);
            }
            if len < -1 || len > limits.max_bulk_len as i64 {
                return Scan::Invalid;
            }

            let data_end = body + len as usize;
            let end = data_end + 2;
            if buf.len() >= end {
                Scan::Complete(end)
            } else if buf.len() > data_end && buf[data_end] != b'\r' {
                Scan::Invalid
            } else {
                Scan::Incomplete
            }
        }
        prefix::ARRAY => {
            let (count, mut next) = match scan_length(buf, pos + 1, limits) {
                Ok(found) => found,
                Err(scan) => return scan,
            };
            if count == -1 {
                return Scan::Complete(next);
            }
            if count < -1 || count > limits.max_array_len as i64 || depth >= limits.max_depth {
                return Scan::Invalid;
            }

            for _ in 0..count {
                match scan_value(buf, next, depth + 1, limits) {
                    Scan::Complete(end) => next = end,
                    other => return other,
                }
            }
            Scan::Complete(next)
        }
        _ => Scan::Invalid,
    }
}

/// Finds the line starting at `pos`; returns its content (CR included)
/// and the offset just past its LF.
fn scan_line<'a>(
    buf: &'a [u8],
    pos: usize,
    limits: &DecoderLimits,
) -> Result<(&'a [u8], usize), Scan> {
    let rest = &buf[pos.min(buf.len())..];
    match rest.iter().position(|&b| b == b'\n') {
        Some(i) if i > limits.max_line_len => Err(Scan::Invalid),
        Some(i) => Ok((&rest[..i], pos + i + 1)),
        None if rest.len() > limits.max_line_len => Err(Scan::Invalid),
        None => Err(Scan::Incomplete),
    }
}

fn scan_length(buf: &[u8], pos: usize, limits: &DecoderLimits) -> Result<(i64, usize), Scan> {
    let (line, end) = scan_line(buf, pos, limits)?;
    line.strip_suffix(b"\r")
        .and_then(parse_length)
        .map(|len| (len, end))
        .ok_or(Scan::Invalid)
}
