//! Uniform unary handler.
//!
//! Every route points at a `UnaryHandler`. The handler is data: a method
//! descriptor, the request field table, and an invoker. Typed messages only
//! exist inside `UnaryMethod::call`; everything around it works on
//! `serde_json::Value`.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tonic::Status;

use crate::binding::{BodyRule, FieldDescriptor, MessageSchema};
use crate::error::GatewayError;
use crate::invoke::{CallContext, CallMetadata, Invoke, MethodDescriptor};
use crate::routing::RouterBuilder;

/// A callable unary RPC method, erased over its message types.
#[async_trait]
pub trait UnaryHandler: Send + Sync {
    fn method(&self) -> MethodDescriptor;

    /// Bindable fields of the request message.
    fn schema(&self) -> &'static [FieldDescriptor];

    /// Convert `request` to the typed message, invoke, and convert back.
    async fn call(
        &self,
        ctx: &CallContext,
        request: Value,
    ) -> Result<(Value, CallMetadata), GatewayError>;
}

/// `UnaryHandler` for a concrete request/response pair.
pub struct UnaryMethod<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    method: MethodDescriptor,
    invoker: Arc<dyn Invoke<Req, Resp>>,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> UnaryMethod<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    pub fn new(method: MethodDescriptor, invoker: Arc<dyn Invoke<Req, Resp>>) -> Self {
        Self {
            method,
            invoker,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<Req, Resp> UnaryHandler for UnaryMethod<Req, Resp>
where
    Req: MessageSchema + DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
{
    fn method(&self) -> MethodDescriptor {
        self.method
    }

    fn schema(&self) -> &'static [FieldDescriptor] {
        Req::fields()
    }

    async fn call(
        &self,
        ctx: &CallContext,
        request: Value,
    ) -> Result<(Value, CallMetadata), GatewayError> {
        let request: Req = serde_json::from_value(request)
            .map_err(|e| GatewayError::MalformedBody(e.to_string()))?;
        let (response, metadata) = self.invoker.invoke(ctx, self.method, request).await?;
        let response = serde_json::to_value(response)
            .map_err(|e| Status::internal(format!("failed to encode response: {e}")))?;
        Ok((response, metadata))
    }
}

/// How a route maps the HTTP body onto the request and the response onto
/// the HTTP body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingRules {
    pub body: BodyRule,
    /// Response field written as the HTTP body instead of the whole message.
    pub response_body: Option<String>,
}

/// One HTTP binding of an RPC method (`get: "/v1/..."`, `body: "*"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRule {
    pub verb: Method,
    pub pattern: String,
    pub rules: BindingRules,
}

impl HttpRule {
    pub fn new(verb: Method, pattern: impl Into<String>) -> Self {
        Self {
            verb,
            pattern: pattern.into(),
            rules: BindingRules::default(),
        }
    }

    pub fn get(pattern: impl Into<String>) -> Self {
        Self::new(Method::GET, pattern)
    }

    pub fn post(pattern: impl Into<String>) -> Self {
        Self::new(Method::POST, pattern)
    }

    pub fn put(pattern: impl Into<String>) -> Self {
        Self::new(Method::PUT, pattern)
    }

    pub fn patch(pattern: impl Into<String>) -> Self {
        Self::new(Method::PATCH, pattern)
    }

    pub fn delete(pattern: impl Into<String>) -> Self {
        Self::new(Method::DELETE, pattern)
    }

    /// `body: "*"` maps the whole body, anything else names one field.
    pub fn body(mut self, body: &str) -> Self {
        self.rules.body = match body {
            "" => BodyRule::None,
            "*" => BodyRule::Whole,
            field => BodyRule::Field(field.to_string()),
        };
        self
    }

    pub fn response_body(mut self, field: &str) -> Self {
        self.rules.response_body = Some(field.to_string()).filter(|f| !f.is_empty());
        self
    }
}

/// Register one method under all of its HTTP bindings, in order.
pub fn register_unary<Req, Resp>(
    builder: &mut RouterBuilder,
    method: MethodDescriptor,
    rules: &[HttpRule],
    invoker: Arc<dyn Invoke<Req, Resp>>,
) -> Result<(), GatewayError>
where
    Req: MessageSchema + DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
{
    let handler: Arc<dyn UnaryHandler> = Arc::new(UnaryMethod::new(method, invoker));
    for rule in rules {
        builder.register_route(
            rule.verb.clone(),
            &rule.pattern,
            rule.rules.clone(),
            handler.clone(),
        )?;
    }
    Ok(())
}
