//! Echo service implementations.
//!
//! `EchoServer` answers in process. `EchoServiceServer` exposes any
//! `EchoService` over a tonic transport so the gateway can reach it remotely.

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Frame;
use tonic::codec::ProstCodec;
use tonic::codegen::{empty_body, http, Body, BoxFuture, Service, StdError};
use tonic::metadata::{MetadataValue, GRPC_CONTENT_TYPE};
use tonic::server::{NamedService, UnaryService};
use tonic::{Code, Request, Response, Status};

use crate::echo::{EchoService, SimpleMessage, SERVICE};
use crate::invoke::CallContext;

/// Incoming metadata key copied back onto the response.
pub const ECHO_TAG: &str = "echo-tag";

/// Trailer naming where the call was served, `local` or `remote`.
pub const ECHO_SERVED: &str = "x-echo-served";

const ECHO_PATH: &str = "/eos.echo.service.EchoService/Echo";
const ECHO_BODY_PATH: &str = "/eos.echo.service.EchoService/EchoBody";

/// Returns every request unchanged.
///
/// Responds with an `x-echo-method` header. When called in process it also
/// sets the `x-echo-served` trailer through the call context; over the
/// transport `EchoServiceServer` sets it instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoServer;

impl EchoServer {
    fn reply(
        &self,
        method: &'static str,
        request: Request<SimpleMessage>,
    ) -> Result<Response<SimpleMessage>, Status> {
        if let Some(ctx) = request.extensions().get::<CallContext>() {
            ctx.set_trailer(ECHO_SERVED, "local")?;
        }
        let tag = request.metadata().get(ECHO_TAG).cloned();
        tracing::debug!(method, "Echoing");

        let mut response = Response::new(request.into_inner());
        response
            .metadata_mut()
            .insert("x-echo-method", MetadataValue::from_static(method));
        if let Some(tag) = tag {
            response.metadata_mut().insert(ECHO_TAG, tag);
        }
        Ok(response)
    }
}

#[async_trait]
impl EchoService for EchoServer {
    async fn echo(
        &self,
        request: Request<SimpleMessage>,
    ) -> Result<Response<SimpleMessage>, Status> {
        self.reply("Echo", request)
    }

    async fn echo_body(
        &self,
        request: Request<SimpleMessage>,
    ) -> Result<Response<SimpleMessage>, Status> {
        self.reply("EchoBody", request)
    }
}

/// tonic server adapter for an `EchoService`.
///
/// Appends `x-echo-served: remote` to the trailers of every response.
#[derive(Clone)]
pub struct EchoServiceServer {
    inner: Arc<dyn EchoService>,
}

impl EchoServiceServer {
    pub fn new(inner: Arc<dyn EchoService>) -> Self {
        Self { inner }
    }
}

impl NamedService for EchoServiceServer {
    const NAME: &'static str = SERVICE;
}

struct EchoCall {
    inner: Arc<dyn EchoService>,
    body: bool,
}

impl UnaryService<SimpleMessage> for EchoCall {
    type Response = SimpleMessage;
    type Future = BoxFuture<Response<SimpleMessage>, Status>;

    fn call(&mut self, request: Request<SimpleMessage>) -> Self::Future {
        let inner = self.inner.clone();
        let body = self.body;
        Box::pin(async move {
            if body {
                inner.echo_body(request).await
            } else {
                inner.echo(request).await
            }
        })
    }
}

impl<B> Service<http::Request<B>> for EchoServiceServer
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let body = match req.uri().path() {
            ECHO_PATH => false,
            ECHO_BODY_PATH => true,
            _ => {
                return Box::pin(async move {
                    let mut response = http::Response::new(empty_body());
                    let headers = response.headers_mut();
                    let status = http::HeaderValue::from(Code::Unimplemented as i32);
                    headers.insert("grpc-status", status);
                    headers.insert(http::header::CONTENT_TYPE, GRPC_CONTENT_TYPE);
                    Ok(response)
                });
            }
        };
        let method = EchoCall {
            inner: self.inner.clone(),
            body,
        };
        Box::pin(async move {
            let codec = ProstCodec::<SimpleMessage, SimpleMessage>::default();
            let mut grpc = tonic::server::Grpc::new(codec);
            let response = grpc.unary(method, req).await;
            Ok(response.map(|body| tonic::body::boxed(body.map_frame(mark_served))))
        })
    }
}

fn mark_served(frame: Frame<Bytes>) -> Frame<Bytes> {
    match frame.into_trailers() {
        Ok(mut trailers) => {
            trailers.insert(ECHO_SERVED, http::HeaderValue::from_static("remote"));
            Frame::trailers(trailers)
        }
        Err(frame) => frame,
    }
}
