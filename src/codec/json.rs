//! JSON codec.

use bytes::Bytes;
use serde_json::Value;

use crate::codec::{Codec, CodecError};

pub const APPLICATION_JSON: &str = "application/json";

/// `application/json` codec, compact or pretty printed.
#[derive(Debug, Clone, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Codec for JsonCodec {
    fn content_type(&self) -> &str {
        APPLICATION_JSON
    }

    fn decode(&self, body: &[u8]) -> Result<Option<Value>, CodecError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(body)
            .map(Some)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn encode(&self, value: &Value) -> Result<Bytes, CodecError> {
        let out = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        out.map(Bytes::from).map_err(|e| CodecError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_body_is_none() {
        let codec = JsonCodec::new();
        assert_eq!(codec.decode(b"").unwrap(), None);
        assert_eq!(codec.decode(b"  \n").unwrap(), None);
    }

    #[test]
    fn test_decode_error() {
        let codec = JsonCodec::new();
        assert!(matches!(codec.decode(b"{\"id\":"), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_round_trip() {
        let codec = JsonCodec::new();
        let value = json!({"id": "42", "num": 7});
        let bytes = codec.encode(&value).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), Some(value));
    }

    #[test]
    fn test_pretty_output() {
        let bytes = JsonCodec::pretty().encode(&json!({"id": "a"})).unwrap();
        assert!(bytes.contains(&b'\n'));
    }
}
