//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single fallback into the gateway
//! - Wire up middleware (tracing, outer timeout, request ID)
//! - Bind server to listener
//! - Drain in-flight requests on shutdown
//!
//! # Design Decisions
//! - Routing is owned by the gateway, so Axum only sees a fallback
//! - Shutdown stops accepting first; in-flight calls are cancelled only
//!   once the grace period has elapsed

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::TimeoutConfig;
use crate::gateway::Gateway;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
    /// Parent of every per-request context.
    pub requests: CancellationToken,
}

/// HTTP front end for a `Gateway`.
pub struct HttpServer {
    router: Router,
    shutdown: CancellationToken,
    requests: CancellationToken,
    grace: Duration,
}

impl HttpServer {
    /// Create a server that stops when `shutdown` is cancelled.
    pub fn new(gateway: Gateway, timeouts: &TimeoutConfig, shutdown: CancellationToken) -> Self {
        let requests = CancellationToken::new();
        let state = AppState {
            gateway,
            requests: requests.clone(),
        };
        let router = Self::build_router(state, Duration::from_secs(timeouts.request_secs));
        Self {
            router,
            shutdown,
            requests,
            grace: Duration::from_secs(timeouts.shutdown_grace_secs),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(request_timeout)),
            )
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let drain = {
            let shutdown = self.shutdown.clone();
            let requests = self.requests.clone();
            let grace = self.grace;
            tokio::spawn(async move {
                shutdown.cancelled().await;
                tokio::time::sleep(grace).await;
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "Grace period elapsed, cancelling in-flight requests"
                );
                requests.cancel();
            })
        };

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let shutdown = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        drain.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Every request goes through the gateway.
async fn gateway_handler(State(state): State<AppState>, request: Request) -> Response {
    state.gateway.handle_with_cancel(&state.requests, request).await
}
