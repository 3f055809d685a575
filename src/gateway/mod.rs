//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! Received
//!     → Routed       (Router::resolve, X-HTTP-Method-Override)
//!     → ParamsBound  (Grpc-Timeout, metadata annotation, path + query binding)
//!     → BodyDecoded  (bounded read, negotiated codec, merge with bound fields)
//!     → Invoked      (UnaryHandler::call under a per-request CallContext)
//!     → ResponseEncoded | ErrorTranslated
//!     → Sent
//! ```
//! Any stage may fail; the failure goes straight to `ErrorTranslated`.
//!
//! # Design Decisions
//! - `Gateway` is a cheap `Clone` over `Arc`s; no locks on the request path
//! - Every request-time error is converted here; nothing escapes `handle`
//! - The per-request context is released by a drop guard on every exit path

pub mod handler;

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::header;
use axum::response::Response;
use bytes::Bytes;
use http_body_util::LengthLimitError;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::{debug, warn};

use crate::binding::BodyRule;
use crate::codec::registry::Negotiated;
use crate::codec::CodecRegistry;
use crate::config::GatewayConfig;
use crate::error::{code_name, GatewayError};
use crate::http::request::{accepts_trailers, annotate_incoming, effective_method, request_id};
use crate::http::response::{error_response, forward_response};
use crate::invoke::{CallContext, CallMetadata};
use crate::observability::metrics::{record_request, record_rpc_error, UNMATCHED_ROUTE};
use crate::resilience::timeouts::{effective_timeout, parse_grpc_timeout, GRPC_TIMEOUT};
use crate::routing::{RouteMatch, Router};

pub use handler::{register_unary, BindingRules, HttpRule, UnaryHandler, UnaryMethod};

/// Request handling options.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    /// Honour `X-HTTP-Method-Override` on POST.
    pub method_override: bool,
    /// Call deadline when the client sends no `Grpc-Timeout` (zero = none).
    pub default_timeout: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            max_body_size: 4 * 1024 * 1024,
            method_override: true,
            default_timeout: Duration::ZERO,
        }
    }
}

impl From<&GatewayConfig> for GatewayOptions {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            max_body_size: config.security.max_body_size,
            method_override: config.routing.method_override,
            default_timeout: Duration::from_secs(config.timeouts.rpc_secs),
        }
    }
}

/// A failed request plus whatever metadata the callee returned.
#[derive(Debug)]
struct Failure {
    error: GatewayError,
    metadata: CallMetadata,
}

impl From<GatewayError> for Failure {
    fn from(error: GatewayError) -> Self {
        Self {
            error,
            metadata: CallMetadata::default(),
        }
    }
}

impl From<Status> for Failure {
    fn from(status: Status) -> Self {
        GatewayError::from(status).into()
    }
}

/// The HTTP → RPC translation engine.
#[derive(Clone)]
pub struct Gateway {
    router: Arc<Router>,
    codecs: Arc<CodecRegistry>,
    options: GatewayOptions,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("routes", &self.router.len())
            .field("options", &self.options)
            .finish()
    }
}

impl Gateway {
    pub fn new(router: Router, codecs: CodecRegistry, options: GatewayOptions) -> Self {
        Self {
            router: Arc::new(router),
            codecs: Arc::new(codecs),
            options,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    /// Handle one request with no outer cancellation scope.
    pub async fn handle(&self, req: Request) -> Response {
        self.handle_with_cancel(&CancellationToken::new(), req).await
    }

    /// Handle one request. Cancelling `parent` cancels the in-flight call.
    pub async fn handle_with_cancel(&self, parent: &CancellationToken, req: Request) -> Response {
        let start = Instant::now();
        let verb = effective_method(req.method(), req.headers(), self.options.method_override);
        let path = req.uri().path().to_string();
        let negotiated = self.codecs.negotiate(req.headers());
        let want_trailers = accepts_trailers(req.headers());
        let req_id = request_id(req.headers()).unwrap_or("-").to_string();

        let (route, outcome) = match self.router.resolve(&verb, &path) {
            Ok(matched) => (
                matched.route.pattern().to_string(),
                self.dispatch(parent, matched, req, &negotiated).await,
            ),
            Err(e) => (UNMATCHED_ROUTE.to_string(), Err(Failure::from(e))),
        };

        let response = match outcome {
            Ok((value, metadata)) => {
                forward_response(&negotiated.outbound, &value, metadata, want_trailers)
            }
            Err(Failure { error, metadata }) => {
                let status = error.http_status();
                if status.is_server_error() {
                    warn!(
                        request_id = %req_id,
                        method = %verb,
                        path = %path,
                        status = status.as_u16(),
                        error = %error,
                        "Request failed"
                    );
                } else {
                    debug!(
                        request_id = %req_id,
                        method = %verb,
                        path = %path,
                        status = status.as_u16(),
                        error = %error,
                        "Request rejected"
                    );
                }
                error_response(&negotiated.outbound, &error, metadata, want_trailers)
            }
        };

        record_request(verb.as_str(), &route, response.status().as_u16(), start);
        response
    }

    async fn dispatch(
        &self,
        parent: &CancellationToken,
        matched: RouteMatch<'_>,
        req: Request,
        negotiated: &Negotiated,
    ) -> Result<(Value, CallMetadata), Failure> {
        let RouteMatch { route, bindings } = matched;
        let binder = route.binder();

        let timeout = req
            .headers()
            .get(GRPC_TIMEOUT)
            .map(|v| {
                v.to_str()
                    .map_err(|_| {
                        let raw = String::from_utf8_lossy(v.as_bytes()).into_owned();
                        GatewayError::InvalidTimeout(raw)
                    })
                    .and_then(parse_grpc_timeout)
            })
            .transpose()?;
        let timeout = effective_timeout(timeout, self.options.default_timeout);

        let remote = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let outgoing = annotate_incoming(req.headers(), remote);
        let (ctx, _guard) = CallContext::derive(parent, timeout, outgoing);

        let bound = binder.bind(&bindings, req.uri().query())?;

        let body = if *binder.body_rule() != BodyRule::None {
            let codec = negotiated.inbound()?;
            let declared = req
                .headers()
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok());
            if declared.is_some_and(|len| len > self.options.max_body_size) {
                return Err(GatewayError::PayloadTooLarge {
                    limit: self.options.max_body_size,
                }
                .into());
            }
            let bytes = tokio::select! {
                _ = ctx.cancelled() => return Err(Status::cancelled("request cancelled").into()),
                read = read_body(req.into_body(), self.options.max_body_size) => read?,
            };
            codec
                .decode(&bytes)
                .map_err(|e| GatewayError::MalformedBody(e.to_string()))?
        } else {
            None
        };

        let request = binder.assemble(bound, body)?;

        let handler = route.handler();
        let method = handler.method();
        debug!(rpc = %method, "Invoking");
        match handler.call(&ctx, request).await {
            Ok((value, mut metadata)) => {
                metadata.merge(ctx.take_metadata());
                let value = match &route.rules().response_body {
                    Some(field) => select_field(value, field),
                    None => value,
                };
                Ok((value, metadata))
            }
            Err(error) => {
                let mut metadata = match &error {
                    GatewayError::Rpc(status) => CallMetadata::from_metadata(status.metadata()),
                    _ => CallMetadata::default(),
                };
                metadata.merge(ctx.take_metadata());
                record_rpc_error(&method.to_string(), code_name(error.code()));
                Err(Failure { error, metadata })
            }
        }
    }
}

async fn read_body(body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        if is_length_limit(&e) {
            GatewayError::PayloadTooLarge { limit }
        } else {
            GatewayError::MalformedBody(format!("failed to read body: {e}"))
        }
    })
}

fn is_length_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Pick `path` (dotted) out of a response value; missing fields yield null.
fn select_field(value: Value, path: &str) -> Value {
    let mut current = value;
    for part in path.split('.') {
        current = match current {
            Value::Object(mut map) => map.remove(part).unwrap_or(Value::Null),
            _ => return Value::Null,
        };
    }
    current
}
