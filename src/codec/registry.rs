//! Content negotiation.
//!
//! # Responsibilities
//! - Map MIME types to codecs
//! - Pick the inbound codec from `Content-Type`
//! - Pick the outbound codec from `Accept`, else mirror the inbound one
//!
//! # Design Decisions
//! - MIME parameters (`; charset=utf-8`) and case are ignored
//! - `Accept` q-values are ignored; the first registered entry wins
//! - Unknown content types fail unless a wildcard fallback is enabled

use std::sync::Arc;

use axum::http::{header, HeaderMap};

use crate::codec::{json::JsonCodec, Codec};
use crate::config::CodecConfig;
use crate::error::GatewayError;

/// Codecs negotiated for one request.
#[derive(Debug, Clone)]
pub struct Negotiated {
    /// Codec for the request body; an error if the content type is unknown.
    pub inbound: Result<Arc<dyn Codec>, String>,
    /// Codec for the response body (success or error).
    pub outbound: Arc<dyn Codec>,
}

impl Negotiated {
    /// Inbound codec, or `UnsupportedMediaType`.
    pub fn inbound(&self) -> Result<Arc<dyn Codec>, GatewayError> {
        self.inbound
            .clone()
            .map_err(GatewayError::UnsupportedMediaType)
    }
}

/// MIME type → codec table with a default.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    codecs: Vec<(String, Arc<dyn Codec>)>,
    default: Arc<dyn Codec>,
    accept_any: bool,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new(Arc::new(JsonCodec::new()))
    }
}

impl CodecRegistry {
    /// Create a registry whose default codec is registered under its own
    /// content type.
    pub fn new(default: Arc<dyn Codec>) -> Self {
        let mime = normalize(default.content_type());
        Self {
            codecs: vec![(mime, default.clone())],
            default,
            accept_any: false,
        }
    }

    /// Build the registry described by the configuration.
    pub fn from_config(config: &CodecConfig) -> Self {
        let json: Arc<dyn Codec> = if config.pretty {
            Arc::new(JsonCodec::pretty())
        } else {
            Arc::new(JsonCodec::new())
        };
        Self::new(json).accept_any_content_type(config.accept_any_content_type)
    }

    /// Register a codec for a MIME type, replacing any previous one.
    pub fn register(mut self, mime: &str, codec: Arc<dyn Codec>) -> Self {
        let mime = normalize(mime);
        self.codecs.retain(|(m, _)| *m != mime);
        self.codecs.push((mime, codec));
        self
    }

    /// Decode unregistered content types with the default codec instead of
    /// rejecting them.
    pub fn accept_any_content_type(mut self, yes: bool) -> Self {
        self.accept_any = yes;
        self
    }

    pub fn default_codec(&self) -> Arc<dyn Codec> {
        self.default.clone()
    }

    /// Look up a codec by MIME type.
    pub fn get(&self, mime: &str) -> Option<Arc<dyn Codec>> {
        let mime = normalize(mime);
        self.codecs
            .iter()
            .find(|(m, _)| *m == mime)
            .map(|(_, c)| c.clone())
    }

    /// Negotiate codecs for a request.
    pub fn negotiate(&self, headers: &HeaderMap) -> Negotiated {
        let inbound = match headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
        {
            None => Ok(self.default.clone()),
            Some(content_type) => match self.get(content_type) {
                Some(codec) => Ok(codec),
                None if self.accept_any => Ok(self.default.clone()),
                None => Err(normalize(content_type)),
            },
        };

        let accepted = headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .find_map(|mime| self.get(mime));

        let outbound = accepted
            .or_else(|| inbound.as_ref().ok().cloned())
            .unwrap_or_else(|| self.default.clone());

        Negotiated { inbound, outbound }
    }
}

fn normalize(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use bytes::Bytes;
    use serde_json::Value;

    use crate::codec::CodecError;

    #[derive(Debug)]
    struct TextCodec;

    impl Codec for TextCodec {
        fn content_type(&self) -> &str {
            "text/plain"
        }

        fn decode(&self, body: &[u8]) -> Result<Option<Value>, CodecError> {
            Ok(Some(Value::String(String::from_utf8_lossy(body).into_owned())))
        }

        fn encode(&self, value: &Value) -> Result<Bytes, CodecError> {
            Ok(Bytes::from(value.to_string()))
        }
    }

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(k.clone(), HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn test_default_when_no_content_type() {
        let registry = CodecRegistry::default();
        let n = registry.negotiate(&HeaderMap::new());
        assert_eq!(n.inbound().unwrap().content_type(), "application/json");
        assert_eq!(n.outbound.content_type(), "application/json");
    }

    #[test]
    fn test_content_type_parameters_ignored() {
        let registry = CodecRegistry::default();
        let n = registry.negotiate(&headers(&[(
            header::CONTENT_TYPE,
            "Application/JSON; charset=utf-8",
        )]));
        assert!(n.inbound().is_ok());
    }

    #[test]
    fn test_unsupported_media_type() {
        let registry = CodecRegistry::default();
        let n = registry.negotiate(&headers(&[(header::CONTENT_TYPE, "text/csv")]));
        assert!(matches!(
            n.inbound(),
            Err(GatewayError::UnsupportedMediaType(m)) if m == "text/csv"
        ));
        // Errors are still encoded with the default codec.
        assert_eq!(n.outbound.content_type(), "application/json");
    }

    #[test]
    fn test_accept_any_falls_back() {
        let registry = CodecRegistry::default().accept_any_content_type(true);
        let n = registry.negotiate(&headers(&[(header::CONTENT_TYPE, "text/csv")]));
        assert_eq!(n.inbound().unwrap().content_type(), "application/json");
    }

    #[test]
    fn test_accept_selects_outbound() {
        let registry = CodecRegistry::default().register("text/plain", Arc::new(TextCodec));
        let n = registry.negotiate(&headers(&[
            (header::CONTENT_TYPE, "application/json"),
            (header::ACCEPT, "text/html, text/plain;q=0.9"),
        ]));
        assert_eq!(n.inbound().unwrap().content_type(), "application/json");
        assert_eq!(n.outbound.content_type(), "text/plain");
    }

    #[test]
    fn test_outbound_mirrors_inbound() {
        let registry = CodecRegistry::default().register("text/plain", Arc::new(TextCodec));
        let n = registry.negotiate(&headers(&[
            (header::CONTENT_TYPE, "text/plain"),
            (header::ACCEPT, "*/*"),
        ]));
        assert_eq!(n.outbound.content_type(), "text/plain");
    }
}
