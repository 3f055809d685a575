//! Response writing and error translation.
//!
//! # Responsibilities
//! - Encode success values with the negotiated codec
//! - Translate `GatewayError` into a status code and error envelope
//! - Write header metadata as `Grpc-Metadata-*` response headers
//! - Write trailer metadata as `Grpc-Trailer-*` HTTP trailers
//!
//! # Design Decisions
//! - Header metadata is attached before the status line, on success and error
//! - Trailers are only sent to clients that announced `TE: trailers`; for
//!   everyone else they are dropped, never an error
//! - Reserved `grpc-*` keys and `content-type` are never forwarded
//! - If even the error envelope fails to encode, a bare 500 is returned

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http_body_util::StreamBody;
use hyper::body::Frame;
use serde::Serialize;
use serde_json::Value;
use tonic::Code;

use crate::codec::Codec;
use crate::error::{code_name, GatewayError};
use crate::http::request::{METADATA_HEADER_PREFIX, METADATA_TRAILER_PREFIX};
use crate::invoke::CallMetadata;

/// JSON error envelope.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorBody {
    pub code: i32,
    pub status: &'static str,
    pub message: String,
    pub details: Vec<Value>,
}

impl ErrorBody {
    pub fn from_error(err: &GatewayError) -> Self {
        let code = err.code();
        Self {
            code: code as i32,
            status: code_name(code),
            message: err.message(),
            details: err.details(),
        }
    }
}

/// Write a successful response.
pub fn forward_response(
    codec: &Arc<dyn Codec>,
    value: &Value,
    metadata: CallMetadata,
    want_trailers: bool,
) -> Response {
    match codec.encode(value) {
        Ok(body) => build(StatusCode::OK, codec.content_type(), body, metadata, want_trailers),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode response");
            let err = GatewayError::Rpc(tonic::Status::internal(e.to_string()));
            error_response(codec, &err, metadata, want_trailers)
        }
    }
}

/// Write an error response.
pub fn error_response(
    codec: &Arc<dyn Codec>,
    err: &GatewayError,
    metadata: CallMetadata,
    want_trailers: bool,
) -> Response {
    let envelope = ErrorBody::from_error(err);
    let encoded = serde_json::to_value(&envelope)
        .map_err(|e| e.to_string())
        .and_then(|v| codec.encode(&v).map_err(|e| e.to_string()));

    let body = match encoded {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode error envelope");
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
        }
    };

    let mut response = build(
        err.http_status(),
        codec.content_type(),
        body,
        metadata,
        want_trailers,
    );

    let headers = response.headers_mut();
    if let GatewayError::MethodNotAllowed { allowed } = err {
        let allow = allowed
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&allow) {
            headers.insert(header::ALLOW, value);
        }
    }
    if err.code() == Code::Unauthenticated {
        if let Ok(value) = HeaderValue::from_str(&err.message()) {
            headers.insert(header::WWW_AUTHENTICATE, value);
        }
    }
    response
}

fn build(
    status: StatusCode,
    content_type: &str,
    body: Bytes,
    metadata: CallMetadata,
    want_trailers: bool,
) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    append_prefixed(&mut headers, METADATA_HEADER_PREFIX, &metadata.headers);

    let mut trailers = HeaderMap::new();
    if want_trailers {
        append_prefixed(&mut trailers, METADATA_TRAILER_PREFIX, &metadata.trailers);
    } else if !metadata.trailers.is_empty() {
        tracing::trace!(count = metadata.trailers.len(), "Dropping trailer metadata");
    }

    let body = if trailers.is_empty() {
        Body::from(body)
    } else {
        let announce = trailers
            .keys()
            .map(HeaderName::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&announce) {
            headers.insert(header::TRAILER, value);
        }
        let frames = [Frame::data(body), Frame::trailers(trailers)];
        Body::new(StreamBody::new(futures_util::stream::iter(
            frames.into_iter().map(Ok::<_, Infallible>),
        )))
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Copy forwardable metadata into `into` under `prefix`.
fn append_prefixed(into: &mut HeaderMap, prefix: &str, metadata: &HeaderMap) {
    for (name, value) in metadata {
        let key = name.as_str();
        if key.starts_with("grpc-") || *name == header::CONTENT_TYPE {
            continue;
        }
        match HeaderName::from_bytes(format!("{prefix}{key}").as_bytes()) {
            Ok(prefixed) => {
                into.append(prefixed, value.clone());
            }
            Err(_) => tracing::debug!(key = %key, "Skipping unforwardable metadata key"),
        }
    }
}
