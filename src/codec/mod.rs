//! Body codec subsystem.
//!
//! # Data Flow
//! ```text
//! Content-Type / Accept headers
//!     → registry.rs (negotiate inbound + outbound codec)
//!     → json.rs (bytes ⇄ serde_json::Value)
//! ```
//!
//! # Design Decisions
//! - Codecs work on `serde_json::Value`, so they stay independent of the
//!   concrete message types
//! - An empty body decodes to `None`, never to an error

use std::fmt::Debug;

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

pub mod json;
pub mod registry;

pub use json::JsonCodec;
pub use registry::CodecRegistry;

/// Errors raised by a codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("encode failed: {0}")]
    Encode(String),
}

/// A paired encoder/decoder for one wire content type.
pub trait Codec: Send + Sync + Debug {
    /// Content type written on responses.
    fn content_type(&self) -> &str;

    /// Decode a request body. Returns `Ok(None)` for an empty body.
    fn decode(&self, body: &[u8]) -> Result<Option<Value>, CodecError>;

    /// Encode a response value.
    fn encode(&self, value: &Value) -> Result<Bytes, CodecError>;
}
