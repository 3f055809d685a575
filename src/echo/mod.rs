//! The `EchoService` surface.
//!
//! # Responsibilities
//! - Define the `SimpleMessage` wire type and its field table
//! - Declare the HTTP routes of `Echo` and `EchoBody`
//! - Wire the service into a router through one of three bootstrap paths
//!
//! # Data Flow
//! ```text
//! register_echo_service_from_endpoint ─ dial ─┐
//! register_echo_service_client ───────────────┼→ RemoteInvoker ─┐
//! register_echo_service_server ─→ LocalInvoker ─────────────────┴→ register_unary
//! ```
//!
//! # Design Decisions
//! - Exactly one bootstrap path is wired per router
//! - Remote wiring shares one channel between both methods

pub mod server;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull, DisplayFromStr, PickFirst};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

use crate::binding::{FieldDescriptor, FieldKind, MessageSchema};
use crate::error::GatewayError;
use crate::gateway::{register_unary, HttpRule};
use crate::invoke::{dial, DialOptions, Invoke, LocalInvoker, MethodDescriptor, RemoteInvoker};
use crate::routing::RouterBuilder;

pub use server::{EchoServer, EchoServiceServer};

/// Fully qualified service name.
pub const SERVICE: &str = "eos.echo.service.EchoService";

pub const ECHO: MethodDescriptor = MethodDescriptor::new(SERVICE, "Echo");
pub const ECHO_BODY: MethodDescriptor = MethodDescriptor::new(SERVICE, "EchoBody");

/// Request and response of both echo methods.
///
/// JSON follows the proto3 mapping: `null` reads as the zero value and
/// `num` is accepted as a number or a decimal string.
#[serde_as]
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleMessage {
    #[serde_as(as = "DefaultOnNull")]
    #[prost(string, tag = "1")]
    pub id: String,
    #[serde_as(as = "DefaultOnNull<PickFirst<(_, DisplayFromStr)>>")]
    #[prost(int64, tag = "2")]
    pub num: i64,
}

impl MessageSchema for SimpleMessage {
    fn fields() -> &'static [FieldDescriptor] {
        static FIELDS: &[FieldDescriptor] = &[
            FieldDescriptor::scalar("id", FieldKind::String),
            FieldDescriptor::scalar("num", FieldKind::Int64),
        ];
        FIELDS
    }
}

/// Server-side contract of the echo service.
#[async_trait]
pub trait EchoService: Send + Sync + 'static {
    async fn echo(
        &self,
        request: Request<SimpleMessage>,
    ) -> Result<Response<SimpleMessage>, Status>;

    async fn echo_body(
        &self,
        request: Request<SimpleMessage>,
    ) -> Result<Response<SimpleMessage>, Status>;
}

/// HTTP routes of `Echo`.
pub fn echo_routes() -> Vec<HttpRule> {
    vec![
        HttpRule::post("/v1/example/echo/{id}"),
        HttpRule::get("/v1/example/echo/{id}/{num}"),
    ]
}

/// HTTP routes of `EchoBody`.
pub fn echo_body_routes() -> Vec<HttpRule> {
    vec![HttpRule::post("/v1/example/echo_body").body("*")]
}

fn register(
    builder: &mut RouterBuilder,
    echo: Arc<dyn Invoke<SimpleMessage, SimpleMessage>>,
    echo_body: Arc<dyn Invoke<SimpleMessage, SimpleMessage>>,
) -> Result<(), GatewayError> {
    register_unary(builder, ECHO, &echo_routes(), echo)?;
    register_unary(builder, ECHO_BODY, &echo_body_routes(), echo_body)
}

/// Dial `endpoint` and route both methods over the resulting channel.
///
/// The channel is closed when `shutdown` is cancelled.
pub async fn register_echo_service_from_endpoint(
    builder: &mut RouterBuilder,
    shutdown: &CancellationToken,
    endpoint: &str,
    opts: &DialOptions,
) -> Result<(), GatewayError> {
    let client = dial(shutdown, endpoint, opts).await?;
    register_echo_service_client(builder, client)
}

/// Route both methods over an existing client. The caller owns its lifetime.
pub fn register_echo_service_client(
    builder: &mut RouterBuilder,
    client: RemoteInvoker,
) -> Result<(), GatewayError> {
    let invoker: Arc<dyn Invoke<SimpleMessage, SimpleMessage>> = Arc::new(client);
    register(builder, invoker.clone(), invoker)
}

/// Route both methods to an in-process implementation.
pub fn register_echo_service_server(
    builder: &mut RouterBuilder,
    service: Arc<dyn EchoService>,
) -> Result<(), GatewayError> {
    let svc = service.clone();
    let echo = LocalInvoker::new(move |req: Request<SimpleMessage>| {
        let svc = svc.clone();
        async move { svc.echo(req).await }.boxed()
    });
    let echo_body = LocalInvoker::new(move |req: Request<SimpleMessage>| {
        let svc = service.clone();
        async move { svc.echo_body(req).await }.boxed()
    });
    register(builder, Arc::new(echo), Arc::new(echo_body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::CallContext;
    use crate::routing::Router;
    use axum::http::Method;
    use prost::Message;
    use serde_json::json;

    #[test]
    fn test_wire_and_json_forms() {
        let msg = SimpleMessage {
            id: "42".into(),
            num: 7,
        };
        let decoded = SimpleMessage::decode(msg.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(serde_json::to_value(&msg).unwrap(), json!({"id": "42", "num": 7}));

        let empty: SimpleMessage = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty, SimpleMessage::default());
    }

    #[test]
    fn test_json_int64_as_string() {
        let msg: SimpleMessage = serde_json::from_value(json!({"num": "7"})).unwrap();
        assert_eq!(msg.num, 7);
        let msg: SimpleMessage = serde_json::from_value(json!({"num": "-12"})).unwrap();
        assert_eq!(msg.num, -12);
        assert!(serde_json::from_value::<SimpleMessage>(json!({"num": "seven"})).is_err());

        // Output stays numeric.
        assert_eq!(serde_json::to_value(&msg).unwrap()["num"], json!(-12));
    }

    #[test]
    fn test_json_null_is_zero_value() {
        let msg: SimpleMessage = serde_json::from_value(json!({"id": null, "num": 1})).unwrap();
        assert_eq!(msg.id, "");
        assert_eq!(msg.num, 1);
        let msg: SimpleMessage = serde_json::from_value(json!({"id": "a", "num": null})).unwrap();
        assert_eq!(msg.num, 0);
    }

    #[tokio::test]
    async fn test_register_server_routes() {
        let mut builder = Router::builder();
        register_echo_service_server(&mut builder, Arc::new(EchoServer)).unwrap();
        let router = builder.build();
        assert_eq!(router.len(), 3);

        let m = router.resolve(&Method::GET, "/v1/example/echo/42/7").unwrap();
        assert_eq!(m.route.handler().method(), ECHO);
        assert_eq!(m.bindings.get("num"), Some("7"));

        let m = router.resolve(&Method::POST, "/v1/example/echo_body").unwrap();
        assert_eq!(m.route.handler().method(), ECHO_BODY);
        let (out, _) = m
            .route
            .handler()
            .call(&CallContext::detached(), json!({"id": "x"}))
            .await
            .unwrap();
        assert_eq!(out, json!({"id": "x", "num": 0}));
    }

    #[tokio::test]
    async fn test_register_twice_is_rejected() {
        let mut builder = Router::builder();
        register_echo_service_server(&mut builder, Arc::new(EchoServer)).unwrap();
        let err = register_echo_service_server(&mut builder, Arc::new(EchoServer)).unwrap_err();
        assert!(matches!(err, GatewayError::DuplicateRoute { .. }));
    }
}
