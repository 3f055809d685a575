//! Remote invocation over a tonic channel.
//!
//! # Responsibilities
//! - Dial the upstream endpoint (eagerly or lazily)
//! - Forward unary calls with outgoing metadata, deadline and method info
//! - Refuse calls once the gateway shuts down
//!
//! # Data Flow
//! ```text
//! dial(shutdown, endpoint, opts)
//!     → Endpoint (timeouts, keepalive) → Channel
//!     → watcher task: shutdown fires → closed token cancelled → task ends
//!
//! invoke(ctx, method, req)
//!     → tonic::Request (metadata, grpc-timeout, GrpcMethod)
//!     → Grpc::streaming(one message, ProstCodec) raced against ctx cancel/deadline
//!     → (message, header metadata, trailer metadata)
//! ```
//!
//! # Design Decisions
//! - Calls go through the streaming client with a single request message;
//!   `Grpc::unary` merges trailers into the headers and loses the split
//! - One `Grpc` client is cloned per call; the channel multiplexes

use std::iter;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use tokio_util::sync::CancellationToken;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::MetadataMap;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, GrpcMethod, Request, Status};
use tracing::{debug, info};

use crate::config::UpstreamConfig;
use crate::error::GatewayError;
use crate::invoke::{CallContext, CallMetadata, Invoke, MethodDescriptor};

/// Options used when dialing the upstream.
#[derive(Debug, Clone)]
pub struct DialOptions {
    pub connect_timeout: Duration,
    /// Transport level timeout applied to every call.
    pub request_timeout: Option<Duration>,
    pub tcp_keepalive: Option<Duration>,
    /// Connect on first use instead of at startup.
    pub lazy: bool,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: None,
            tcp_keepalive: Some(Duration::from_secs(60)),
            lazy: false,
        }
    }
}

impl From<&UpstreamConfig> for DialOptions {
    fn from(config: &UpstreamConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            request_timeout: config.request_timeout_secs.map(Duration::from_secs),
            tcp_keepalive: (config.keepalive_secs > 0)
                .then(|| Duration::from_secs(config.keepalive_secs)),
            lazy: config.lazy_connect,
        }
    }
}

/// Invoker that forwards calls over a tonic channel.
#[derive(Debug, Clone)]
pub struct RemoteInvoker {
    grpc: Grpc<Channel>,
    endpoint: String,
    closed: CancellationToken,
}

/// Build a channel to `endpoint` and wrap it in an invoker.
///
/// The invoker stops accepting calls once `shutdown` is cancelled.
pub async fn dial(
    shutdown: &CancellationToken,
    endpoint: &str,
    opts: &DialOptions,
) -> Result<RemoteInvoker, GatewayError> {
    let uri = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };

    debug!(uri = %uri, lazy = opts.lazy, "Dialing upstream");

    let mut builder = Endpoint::from_shared(uri.clone())?
        .connect_timeout(opts.connect_timeout)
        .tcp_keepalive(opts.tcp_keepalive);
    if let Some(timeout) = opts.request_timeout {
        builder = builder.timeout(timeout);
    }

    let channel = if opts.lazy {
        builder.connect_lazy()
    } else {
        builder.connect().await?
    };

    info!(endpoint = %uri, "Upstream channel ready");

    let invoker = RemoteInvoker::from_channel(channel, uri);
    invoker.watch(shutdown.clone());
    Ok(invoker)
}

impl RemoteInvoker {
    /// Wrap an existing channel.
    pub fn from_channel(channel: Channel, endpoint: impl Into<String>) -> Self {
        Self {
            grpc: Grpc::new(channel),
            endpoint: endpoint.into(),
            closed: CancellationToken::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Close the invoker when `shutdown` fires. The watcher task ends with it.
    fn watch(&self, shutdown: CancellationToken) {
        let closed = self.closed.clone();
        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(endpoint = %endpoint, "Closing upstream channel");
                    closed.cancel();
                }
                _ = closed.cancelled() => {}
            }
        });
    }

    /// Stop accepting calls.
    pub fn close(&self) {
        self.closed.cancel();
    }
}

#[async_trait]
impl<Req, Resp> Invoke<Req, Resp> for RemoteInvoker
where
    Req: prost::Message + Send + Sync + 'static,
    Resp: prost::Message + Default + Send + Sync + 'static,
{
    async fn invoke(
        &self,
        ctx: &CallContext,
        method: MethodDescriptor,
        request: Req,
    ) -> Result<(Resp, CallMetadata), Status> {
        if self.is_closed() {
            return Err(Status::unavailable("upstream channel closed"));
        }

        let path = PathAndQuery::from_str(&method.path())
            .map_err(|e| Status::internal(format!("invalid method path: {e}")))?;

        let mut req = Request::new(request);
        *req.metadata_mut() = MetadataMap::from_headers(ctx.outgoing_metadata().clone());
        req.extensions_mut()
            .insert(GrpcMethod::new(method.service, method.method));
        if let Some(remaining) = ctx.remaining() {
            if remaining.is_zero() {
                return Err(Status::deadline_exceeded("deadline exceeded"));
            }
            req.set_timeout(remaining);
        }

        let mut grpc = self.grpc.clone();
        let call = async move {
            grpc.ready().await.map_err(|e| {
                Status::new(Code::Unavailable, format!("upstream not ready: {e}"))
            })?;
            // A one-message stream keeps headers and trailers apart.
            let req = req.map(|message| stream::iter(iter::once(message)));
            let response = grpc
                .streaming(req, path, ProstCodec::<Req, Resp>::default())
                .await?;
            let (headers, mut body, _) = response.into_parts();
            let message = body
                .message()
                .await?
                .ok_or_else(|| Status::internal("upstream sent no response message"))?;
            let trailers = body.trailers().await?.unwrap_or_default();
            Ok::<_, Status>((
                message,
                CallMetadata {
                    headers: headers.into_headers(),
                    trailers: trailers.into_headers(),
                },
            ))
        };

        debug!(method = %method, endpoint = %self.endpoint, "Forwarding call");
        let closed = self.closed.clone();
        ctx.run(async move {
            tokio::select! {
                _ = closed.cancelled() => Err(Status::unavailable("upstream channel closed")),
                result = call => result.map_err(transport_status),
            }
        })
        .await
    }
}

/// Errors raised by the transport itself (connect refused, reset) come back
/// as `Unknown` with a source attached; report them as `Unavailable`.
fn transport_status(status: Status) -> Status {
    if status.code() == Code::Unknown && std::error::Error::source(&status).is_some() {
        Status::unavailable(status.message().to_string())
    } else {
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[derive(Clone, PartialEq, prost::Message)]
    struct Ping {
        #[prost(string, tag = "1")]
        text: String,
    }

    const METHOD: MethodDescriptor = MethodDescriptor::new("test.Svc", "Ping");

    #[test]
    fn test_dial_options_from_config() {
        let config = UpstreamConfig {
            connect_timeout_secs: 2,
            keepalive_secs: 0,
            lazy_connect: true,
            ..UpstreamConfig::default()
        };
        let opts = DialOptions::from(&config);
        assert_eq!(opts.connect_timeout, Duration::from_secs(2));
        assert!(opts.tcp_keepalive.is_none());
        assert!(opts.lazy);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_unavailable() {
        let shutdown = CancellationToken::new();
        let opts = DialOptions {
            lazy: true,
            connect_timeout: Duration::from_millis(200),
            ..DialOptions::default()
        };
        // Port 1 on loopback refuses connections.
        let invoker = dial(&shutdown, "127.0.0.1:1", &opts).await.unwrap();
        let result: Result<(Ping, CallMetadata), Status> = invoker
            .invoke(&CallContext::detached(), METHOD, Ping::default())
            .await;
        assert_eq!(result.unwrap_err().code(), Code::Unavailable);
    }

    #[tokio::test]
    async fn test_shutdown_closes_invoker() {
        let shutdown = CancellationToken::new();
        let opts = DialOptions {
            lazy: true,
            ..DialOptions::default()
        };
        let invoker = dial(&shutdown, "127.0.0.1:1", &opts).await.unwrap();
        shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(invoker.is_closed());

        let (ctx, _guard) =
            CallContext::derive(&CancellationToken::new(), None, HeaderMap::new());
        let result: Result<(Ping, CallMetadata), Status> =
            invoker.invoke(&ctx, METHOD, Ping::default()).await;
        assert_eq!(result.unwrap_err().code(), Code::Unavailable);
    }
}
