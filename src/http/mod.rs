//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, outer timeout)
//!     → request.rs (effective verb, metadata annotation)
//!     → [gateway dispatches the call]
//!     → response.rs (encode, metadata headers/trailers, error envelope)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{error_response, forward_response, ErrorBody};
pub use server::HttpServer;
