//! In-process invocation.
//!
//! The callee is an async function taking a `tonic::Request`, the same shape
//! a tonic service method has, so a service implementation can be wired
//! straight in without a network hop. The `CallContext` rides in the request
//! extensions; the callee may use it to set metadata or watch for
//! cancellation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tonic::metadata::MetadataMap;
use tonic::{GrpcMethod, Request, Response, Status};

use crate::invoke::{CallContext, CallMetadata, Invoke, MethodDescriptor};

type LocalFn<Req, Resp> =
    dyn Fn(Request<Req>) -> BoxFuture<'static, Result<Response<Resp>, Status>> + Send + Sync;

/// Invoker that calls an in-process implementation.
pub struct LocalInvoker<Req, Resp> {
    call: Arc<LocalFn<Req, Resp>>,
}

impl<Req, Resp> LocalInvoker<Req, Resp> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Request<Req>) -> BoxFuture<'static, Result<Response<Resp>, Status>>
            + Send
            + Sync
            + 'static,
    {
        Self { call: Arc::new(f) }
    }
}

impl<Req, Resp> Clone for LocalInvoker<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            call: self.call.clone(),
        }
    }
}

impl<Req, Resp> fmt::Debug for LocalInvoker<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalInvoker").finish_non_exhaustive()
    }
}

#[async_trait]
impl<Req, Resp> Invoke<Req, Resp> for LocalInvoker<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn invoke(
        &self,
        ctx: &CallContext,
        method: MethodDescriptor,
        request: Req,
    ) -> Result<(Resp, CallMetadata), Status> {
        let mut req = Request::new(request);
        *req.metadata_mut() = MetadataMap::from_headers(ctx.outgoing_metadata().clone());
        req.extensions_mut().insert(ctx.clone());
        req.extensions_mut()
            .insert(GrpcMethod::new(method.service, method.method));

        tracing::trace!(method = %method, "Invoking local method");
        let response = ctx.run((self.call)(req)).await?;
        let (metadata, message, _) = response.into_parts();
        Ok((message, CallMetadata::from_headers(metadata.into_headers())))
    }
}
