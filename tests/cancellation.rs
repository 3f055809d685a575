//! Cancelling the inbound request cancels the outbound call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request as HttpRequest;
use rpc_gateway::codec::CodecRegistry;
use rpc_gateway::config::TimeoutConfig;
use rpc_gateway::echo::{register_echo_service_server, EchoService, SimpleMessage};
use rpc_gateway::routing::Router;
use rpc_gateway::{Gateway, GatewayOptions, HttpServer};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

/// Sets its flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Never answers; records whether the in-flight call was dropped.
struct Stalled {
    started: Arc<Notify>,
    dropped: Arc<AtomicBool>,
}

impl Stalled {
    async fn stall(&self) -> Result<Response<SimpleMessage>, Status> {
        let _flag = DropFlag(self.dropped.clone());
        self.started.notify_one();
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(Status::internal("not cancelled"))
    }
}

#[async_trait]
impl EchoService for Stalled {
    async fn echo(&self, _: Request<SimpleMessage>) -> Result<Response<SimpleMessage>, Status> {
        self.stall().await
    }

    async fn echo_body(
        &self,
        _: Request<SimpleMessage>,
    ) -> Result<Response<SimpleMessage>, Status> {
        self.stall().await
    }
}

fn gateway(service: Arc<dyn EchoService>) -> Gateway {
    let mut builder = Router::builder();
    register_echo_service_server(&mut builder, service).unwrap();
    Gateway::new(builder.build(), CodecRegistry::default(), GatewayOptions::default())
}

#[tokio::test]
async fn test_cancel_propagates_to_call() {
    let started = Arc::new(Notify::new());
    let dropped = Arc::new(AtomicBool::new(false));
    let gw = gateway(Arc::new(Stalled {
        started: started.clone(),
        dropped: dropped.clone(),
    }));

    let parent = CancellationToken::new();
    let canceller = parent.clone();
    tokio::spawn(async move {
        started.notified().await;
        canceller.cancel();
    });

    let req = HttpRequest::get("/v1/example/echo/1/2").body(Body::empty()).unwrap();
    let resp = tokio::time::timeout(Duration::from_secs(5), gw.handle_with_cancel(&parent, req))
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 499);
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_deadline_propagates_to_call() {
    let dropped = Arc::new(AtomicBool::new(false));
    let gw = gateway(Arc::new(Stalled {
        started: Arc::new(Notify::new()),
        dropped: dropped.clone(),
    }));

    let req = HttpRequest::get("/v1/example/echo/1/2")
        .header("grpc-timeout", "50m")
        .body(Body::empty())
        .unwrap();
    let resp = tokio::time::timeout(Duration::from_secs(5), gw.handle(req))
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 504);
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_client_disconnect_drops_call() {
    let started = Arc::new(Notify::new());
    let dropped = Arc::new(AtomicBool::new(false));
    let gw = gateway(Arc::new(Stalled {
        started: started.clone(),
        dropped: dropped.clone(),
    }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = HttpServer::new(gw, &TimeoutConfig::default(), shutdown.clone());
    tokio::spawn(server.run(listener));

    // The client gives up and closes the connection mid-call.
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let result = client
        .get(format!("http://{addr}/v1/example/echo/1/2"))
        .send()
        .await;
    assert!(result.unwrap_err().is_timeout());
    tokio::time::timeout(Duration::from_secs(1), started.notified())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(dropped.load(Ordering::SeqCst));

    shutdown.cancel();
}
