//! Invocation adapter subsystem.
//!
//! # Data Flow
//! ```text
//! typed request + CallContext
//!     → Invoke::invoke
//!         ├─ remote.rs (tonic channel, ProstCodec)
//!         └─ local.rs  (in-process async fn)
//!     → typed response + CallMetadata, or tonic::Status
//! ```
//!
//! # Design Decisions
//! - One trait covers both variants so handlers never know which is wired
//! - Errors stay `tonic::Status`; translation to HTTP happens at the edge
//! - Metadata travels as plain `HeaderMap`s

use axum::http::HeaderMap;
use async_trait::async_trait;
use tonic::metadata::MetadataMap;
use tonic::Status;

pub mod context;
pub mod local;
pub mod remote;

pub use context::CallContext;
pub use local::LocalInvoker;
pub use remote::{dial, DialOptions, RemoteInvoker};

/// Fully qualified name of one RPC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub service: &'static str,
    pub method: &'static str,
}

impl MethodDescriptor {
    pub const fn new(service: &'static str, method: &'static str) -> Self {
        Self { service, method }
    }

    /// The RPC path, `/package.Service/Method`.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.service, self.method)
    }
}

impl std::fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.service, self.method)
    }
}

/// Header and trailer metadata returned by a call.
#[derive(Debug, Clone, Default)]
pub struct CallMetadata {
    pub headers: HeaderMap,
    pub trailers: HeaderMap,
}

impl CallMetadata {
    pub fn from_headers(headers: HeaderMap) -> Self {
        Self {
            headers,
            trailers: HeaderMap::new(),
        }
    }

    /// Response metadata carried by a tonic message or status.
    pub fn from_metadata(metadata: &MetadataMap) -> Self {
        Self::from_headers(metadata.clone().into_headers())
    }

    /// Append everything from `other`.
    pub fn merge(&mut self, other: CallMetadata) {
        extend(&mut self.headers, other.headers);
        extend(&mut self.trailers, other.trailers);
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.trailers.is_empty()
    }
}

fn extend(into: &mut HeaderMap, from: HeaderMap) {
    let mut last = None;
    for (name, value) in from {
        // `None` means "same name as the previous entry".
        if let Some(name) = name {
            last = Some(name);
        }
        if let Some(name) = &last {
            into.append(name.clone(), value);
        }
    }
}

/// Capability to call one unary RPC method.
#[async_trait]
pub trait Invoke<Req, Resp>: Send + Sync
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn invoke(
        &self,
        ctx: &CallContext,
        method: MethodDescriptor,
        request: Req,
    ) -> Result<(Resp, CallMetadata), Status>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_method_path() {
        let m = MethodDescriptor::new("eos.echo.service.EchoService", "Echo");
        assert_eq!(m.path(), "/eos.echo.service.EchoService/Echo");
        assert_eq!(m.to_string(), "eos.echo.service.EchoService/Echo");
    }

    #[test]
    fn test_merge_keeps_multi_values() {
        let mut a = CallMetadata::default();
        a.headers.append("x-a", HeaderValue::from_static("1"));
        let mut b = CallMetadata::default();
        b.headers.append("x-a", HeaderValue::from_static("2"));
        b.headers.append("x-a", HeaderValue::from_static("3"));
        b.trailers.append("x-t", HeaderValue::from_static("t"));
        a.merge(b);
        let values: Vec<_> = a.headers.get_all("x-a").iter().collect();
        assert_eq!(values, ["1", "2", "3"]);
        assert_eq!(a.trailers.get("x-t").unwrap(), "t");
    }
}
