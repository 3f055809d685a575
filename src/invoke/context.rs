//! Per-request call context.
//!
//! # Responsibilities
//! - Derive a cancellable scope from the inbound request token
//! - Carry the call deadline and outgoing metadata
//! - Collect header/trailer metadata set by an in-process callee
//!
//! # Design Decisions
//! - The derived token is a child of the inbound one; the returned
//!   `DropGuard` cancels it on every exit path, so nothing tied to the
//!   request outlives it
//! - Cancellation and deadline are raced against the call future here, once,
//!   for both invocation variants

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tonic::Status;

use crate::invoke::CallMetadata;

/// Context shared between the gateway and one in-flight call.
#[derive(Debug, Clone)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    outgoing: Arc<HeaderMap>,
    sink: Arc<Mutex<CallMetadata>>,
}

impl CallContext {
    /// Derive a context scoped to one request.
    ///
    /// The context is cancelled when `parent` is cancelled or when the
    /// returned guard is dropped, whichever happens first.
    pub fn derive(
        parent: &CancellationToken,
        timeout: Option<Duration>,
        outgoing: HeaderMap,
    ) -> (Self, DropGuard) {
        let token = parent.child_token();
        let guard = token.clone().drop_guard();
        let ctx = Self {
            token,
            deadline: timeout.map(|t| Instant::now() + t),
            outgoing: Arc::new(outgoing),
            sink: Arc::new(Mutex::new(CallMetadata::default())),
        };
        (ctx, guard)
    }

    /// A context with no parent, deadline or metadata. Mostly for tests.
    pub fn detached() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            outgoing: Arc::new(HeaderMap::new()),
            sink: Arc::new(Mutex::new(CallMetadata::default())),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Resolves once the call has been cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Metadata to send with the outbound call.
    pub fn outgoing_metadata(&self) -> &HeaderMap {
        &self.outgoing
    }

    /// Record a response header from inside a callee.
    pub fn set_header(&self, key: &str, value: &str) -> Result<(), Status> {
        let (name, value) = metadata_pair(key, value)?;
        self.with_sink(|sink| {
            sink.headers.append(name, value);
        })
    }

    /// Record a response trailer from inside a callee.
    pub fn set_trailer(&self, key: &str, value: &str) -> Result<(), Status> {
        let (name, value) = metadata_pair(key, value)?;
        self.with_sink(|sink| {
            sink.trailers.append(name, value);
        })
    }

    /// Drain metadata recorded by the callee.
    pub fn take_metadata(&self) -> CallMetadata {
        self.sink
            .lock()
            .map(|mut sink| std::mem::take(&mut *sink))
            .unwrap_or_default()
    }

    /// Run `fut` until it completes, the context is cancelled, or the
    /// deadline passes.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, Status>
    where
        F: Future<Output = Result<T, Status>>,
    {
        if self.is_cancelled() {
            return Err(Status::cancelled("request cancelled"));
        }
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Status::cancelled("request cancelled")),
            _ = expired => Err(Status::deadline_exceeded("deadline exceeded")),
            result = fut => result,
        }
    }

    fn with_sink(&self, f: impl FnOnce(&mut CallMetadata)) -> Result<(), Status> {
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| Status::internal("call metadata lock poisoned"))?;
        f(&mut sink);
        Ok(())
    }
}

fn metadata_pair(key: &str, value: &str) -> Result<(HeaderName, HeaderValue), Status> {
    let name = HeaderName::from_bytes(key.to_ascii_lowercase().as_bytes())
        .map_err(|_| Status::internal(format!("invalid metadata key {key:?}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|_| Status::internal(format!("invalid metadata value for {key:?}")))?;
    Ok((name, value))
}
