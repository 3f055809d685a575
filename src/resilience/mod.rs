//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request:
//!     → timeouts.rs (Grpc-Timeout header or configured default)
//!     → CallContext deadline → outbound grpc-timeout
//! ```
//!
//! # Design Decisions
//! - Every outbound call can carry a deadline
//! - Retries are left to the RPC client; the gateway never replays a call

pub mod timeouts;
