//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Wire echo service (dial or in-process) → Gateway → Listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain (grace period) → Cancel rest → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then upstream, then listeners
//! - One root cancellation token; every per-request scope derives from it
//! - Shutdown has a timeout: in-flight calls are cancelled after the grace period

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build_gateway, serve, StartupError};
