//! Gateway error taxonomy and RPC → HTTP status translation.
//!
//! # Responsibilities
//! - Define every failure the gateway can produce, startup and request time
//! - Map RPC status codes to HTTP status codes with a fixed table
//! - Provide the stable status kind string used in error bodies
//!
//! # Design Decisions
//! - Startup errors (`MalformedPattern`, `DuplicateRoute`) are fatal and never
//!   reach a response
//! - Callee errors are carried as `tonic::Status` untouched

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;
use tonic::{Code, Status};

/// Errors produced while building or serving the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A path template failed to compile.
    #[error("malformed pattern {pattern:?}: {reason}")]
    MalformedPattern { pattern: String, reason: String },

    /// The same verb and template were registered twice.
    #[error("duplicate route {verb} {pattern}")]
    DuplicateRoute { verb: Method, pattern: String },

    /// A capture required by the route produced no value.
    #[error("missing parameter {name}")]
    MissingParameter { name: String },

    /// A raw parameter could not be coerced to the field's type.
    #[error("type mismatch, parameter: {field}, error: {cause}")]
    TypeMismatch {
        field: String,
        value: String,
        cause: String,
    },

    /// The request body could not be decoded.
    #[error("malformed body: {0}")]
    MalformedBody(String),

    /// No codec is registered for the request's content type.
    #[error("unsupported media type {0:?}")]
    UnsupportedMediaType(String),

    /// The request body exceeded the configured limit.
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The `Grpc-Timeout` header could not be parsed.
    #[error("invalid grpc-timeout {0:?}")]
    InvalidTimeout(String),

    /// No route matched the request path.
    #[error("Not Found")]
    NotFound,

    /// The path matched, but only under other verbs.
    #[error("Method Not Allowed")]
    MethodNotAllowed { allowed: Vec<Method> },

    /// The callee (or the channel) returned an RPC status.
    #[error("rpc error: {}", .0.message())]
    Rpc(#[from] Status),

    /// The upstream channel could not be established.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

impl GatewayError {
    /// The RPC code reported in the error envelope.
    pub fn code(&self) -> Code {
        match self {
            GatewayError::MalformedPattern { .. } | GatewayError::DuplicateRoute { .. } => {
                Code::Internal
            }
            GatewayError::MissingParameter { .. }
            | GatewayError::TypeMismatch { .. }
            | GatewayError::MalformedBody(_)
            | GatewayError::UnsupportedMediaType(_)
            | GatewayError::InvalidTimeout(_) => Code::InvalidArgument,
            GatewayError::PayloadTooLarge { .. } => Code::ResourceExhausted,
            GatewayError::NotFound => Code::NotFound,
            GatewayError::MethodNotAllowed { .. } => Code::Unimplemented,
            GatewayError::Rpc(status) => status.code(),
            GatewayError::Transport(_) => Code::Unavailable,
        }
    }

    /// The HTTP status written for this error.
    pub fn http_status(&self) -> StatusCode {
        match self {
            GatewayError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            other => http_status_from_code(other.code()),
        }
    }

    /// Human readable message for the error envelope.
    pub fn message(&self) -> String {
        match self {
            GatewayError::Rpc(status) => status.message().to_string(),
            other => other.to_string(),
        }
    }

    /// Structured detail entries for the error envelope.
    pub fn details(&self) -> Vec<Value> {
        match self {
            GatewayError::TypeMismatch { field, value, cause } => vec![json!({
                "@type": "type.googleapis.com/google.rpc.BadRequest",
                "fieldViolations": [{
                    "field": field,
                    "value": value,
                    "description": cause,
                }],
            })],
            GatewayError::MissingParameter { name } => vec![json!({
                "@type": "type.googleapis.com/google.rpc.BadRequest",
                "fieldViolations": [{
                    "field": name,
                    "description": "missing parameter",
                }],
            })],
            _ => Vec::new(),
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Map an RPC status code to the HTTP status the gateway responds with.
pub fn http_status_from_code(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        // Client Closed Request, as used by nginx.
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT),
        Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::FailedPrecondition => StatusCode::BAD_REQUEST,
        Code::Aborted => StatusCode::CONFLICT,
        Code::OutOfRange => StatusCode::BAD_REQUEST,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Stable, programmatic name of an RPC code (`INVALID_ARGUMENT`, ...).
pub fn code_name(code: Code) -> &'static str {
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "CANCELLED",
        Code::Unknown => "UNKNOWN",
        Code::InvalidArgument => "INVALID_ARGUMENT",
        Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
        Code::NotFound => "NOT_FOUND",
        Code::AlreadyExists => "ALREADY_EXISTS",
        Code::PermissionDenied => "PERMISSION_DENIED",
        Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
        Code::FailedPrecondition => "FAILED_PRECONDITION",
        Code::Aborted => "ABORTED",
        Code::OutOfRange => "OUT_OF_RANGE",
        Code::Unimplemented => "UNIMPLEMENTED",
        Code::Internal => "INTERNAL",
        Code::Unavailable => "UNAVAILABLE",
        Code::DataLoss => "DATA_LOSS",
        Code::Unauthenticated => "UNAUTHENTICATED",
    }
}
