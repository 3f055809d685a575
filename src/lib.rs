//! HTTP/JSON → unary RPC gateway.
//!
//! Lets HTTP clients call unary RPC methods without an RPC client: an
//! incoming request is matched to a method, its parameters are bound from the
//! path, query string and body, the method is invoked over a tonic channel or
//! in process, and the result or error is written back as JSON.
//!
//! # Architecture Overview
//!
//! ```text
//!     HTTP request
//!         │
//!         ▼
//!   ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌───────────┐
//!   │   http    │──▶│  routing  │──▶│  binding  │──▶│   codec   │
//!   │  server   │   │  router   │   │  params   │   │  decode   │
//!   └───────────┘   └───────────┘   └───────────┘   └─────┬─────┘
//!                                                         │
//!                                                         ▼
//!   ┌───────────┐   ┌───────────┐                   ┌───────────┐
//!   │   http    │◀──│   error   │◀──────────────────│  invoke   │──▶ RPC service
//!   │ response  │   │ translate │                   │remote/local│   (tonic or
//!   └───────────┘   └───────────┘                   └───────────┘    in process)
//!
//!   Cross-cutting: config, observability, lifecycle, resilience::timeouts
//! ```

// Core subsystems
pub mod binding;
pub mod codec;
pub mod error;
pub mod gateway;
pub mod http;
pub mod invoke;
pub mod routing;

// Services
pub mod echo;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use gateway::{Gateway, GatewayOptions};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
