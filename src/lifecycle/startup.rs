//! Startup orchestration.
//!
//! # Responsibilities
//! - Wire the echo service (remote channel or in-process) into a router
//! - Build the gateway from validated configuration
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::codec::CodecRegistry;
use crate::config::{GatewayConfig, UpstreamMode};
use crate::echo::{register_echo_service_from_endpoint, register_echo_service_server, EchoServer};
use crate::error::GatewayError;
use crate::gateway::{Gateway, GatewayOptions};
use crate::http::HttpServer;
use crate::invoke::DialOptions;
use crate::lifecycle::Shutdown;
use crate::routing::Router;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Build a gateway serving the echo service as configured.
///
/// In remote mode the upstream channel is closed when `shutdown` is cancelled.
pub async fn build_gateway(
    config: &GatewayConfig,
    shutdown: &CancellationToken,
) -> Result<Gateway, GatewayError> {
    let mut builder = Router::builder();
    match config.upstream.mode {
        UpstreamMode::Remote => {
            register_echo_service_from_endpoint(
                &mut builder,
                shutdown,
                &config.upstream.endpoint,
                &DialOptions::from(&config.upstream),
            )
            .await?
        }
        UpstreamMode::Local => register_echo_service_server(&mut builder, Arc::new(EchoServer))?,
    }

    let router = builder.build();
    tracing::info!(
        routes = router.len(),
        mode = ?config.upstream.mode,
        "Routes registered"
    );

    Ok(Gateway::new(
        router,
        CodecRegistry::from_config(&config.codec),
        GatewayOptions::from(config),
    ))
}

/// Build the gateway, bind the listener and serve until `shutdown`.
pub async fn serve(config: GatewayConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    let gateway = build_gateway(&config, shutdown.token()).await?;

    let address = config.listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    HttpServer::new(gateway, &config.timeouts, shutdown.token().clone())
        .run(listener)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;

    #[tokio::test]
    async fn test_build_local_gateway() {
        let config = GatewayConfig {
            upstream: UpstreamConfig {
                mode: UpstreamMode::Local,
                ..UpstreamConfig::default()
            },
            ..GatewayConfig::default()
        };
        let gateway = build_gateway(&config, &CancellationToken::new()).await.unwrap();
        assert_eq!(gateway.router().len(), 3);
    }

    #[tokio::test]
    async fn test_remote_dial_failure_is_fatal() {
        let config = GatewayConfig {
            upstream: UpstreamConfig {
                endpoint: "not a uri".to_string(),
                ..UpstreamConfig::default()
            },
            ..GatewayConfig::default()
        };
        let err = build_gateway(&config, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }
}
