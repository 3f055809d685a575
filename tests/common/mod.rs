//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use rpc_gateway::config::{GatewayConfig, UpstreamConfig, UpstreamMode};
use rpc_gateway::echo::{EchoServer, EchoService, EchoServiceServer};
use rpc_gateway::lifecycle::build_gateway;
use rpc_gateway::{HttpServer, Shutdown};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A gateway listening on an ephemeral local port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub server: JoinHandle<Result<(), std::io::Error>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Config serving the echo service in process.
pub fn local_config() -> GatewayConfig {
    GatewayConfig {
        upstream: UpstreamConfig {
            mode: UpstreamMode::Local,
            ..UpstreamConfig::default()
        },
        ..GatewayConfig::default()
    }
}

/// Config dialing an echo upstream at `endpoint`.
#[allow(dead_code)]
pub fn remote_config(endpoint: &str, lazy: bool) -> GatewayConfig {
    GatewayConfig {
        upstream: UpstreamConfig {
            mode: UpstreamMode::Remote,
            endpoint: endpoint.to_string(),
            lazy_connect: lazy,
            ..UpstreamConfig::default()
        },
        ..GatewayConfig::default()
    }
}

/// Build a gateway from `config` and serve it on 127.0.0.1:0.
pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    let shutdown = Shutdown::new();
    let gateway = build_gateway(&config, shutdown.token()).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(gateway, &config.timeouts, shutdown.token().clone());
    let server = tokio::spawn(server.run(listener));

    TestGateway {
        addr,
        shutdown,
        server,
    }
}

/// Serve `service` over tonic on 127.0.0.1:0 until `stop` is cancelled.
#[allow(dead_code)]
pub async fn spawn_echo_upstream(stop: CancellationToken) -> SocketAddr {
    spawn_upstream(Arc::new(EchoServer), stop).await
}

#[allow(dead_code)]
pub async fn spawn_upstream(service: Arc<dyn EchoService>, stop: CancellationToken) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);

    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(EchoServiceServer::new(service))
            .serve_with_incoming_shutdown(incoming, stop.cancelled_owned())
            .await
            .unwrap();
    });

    addr
}
