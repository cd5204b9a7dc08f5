//! RESP Protocol Implementation
//!
//! This module turns a raw byte stream into [`Value`]s and back.
//! It knows nothing about commands or storage.
//!
//! ## Modules
//!
//! - `types`: Defines the `Value` enum and wire constants
//! - `decoder`: Stream decoder plus the buffered `parse_frame` helper
//! - `encoder`: Serialization and the flushing `Encoder`
//!
//! ## Example
//!
//! ```
//! use shardkv::protocol::{parse_frame, DecoderLimits, Value};
//!
//! // Decoding incoming data
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (value, consumed) = parse_frame(data, DecoderLimits::default()).unwrap().unwrap();
//! assert_eq!(consumed, data.len());
//!
//! // Creating responses
//! let response = Value::bulk_string("Ariz");
//! assert_eq!(response.serialize(), b"$4\r\nAriz\r\n");
//! ```

pub mod decoder;
pub mod encoder;
pub mod types;

// Re-export commonly used types for convenience
pub use decoder::{parse_frame, DecodeError, DecodeResult, Decoder, DecoderLimits};
pub use encoder::{encode_frame, EncodeError, EncodeResult, Encoder};
pub use types::Value;
