//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route registration (at startup):
//!     (verb, pattern, rules, handler)
//!     → template.rs (parse + validate pattern)
//!     → matcher.rs (lower to op sequence)
//!     → router.rs (duplicate check, freeze as immutable Router)
//!
//! Incoming request (verb, path):
//!     → PathTokens (split + percent-decode once)
//!     → first matching route in registration order
//!     → RouteMatch { route, bindings } | NotFound | MethodNotAllowed
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod router;
pub mod template;

pub use matcher::{CompiledMatcher, PathTokens, RequestBindings};
pub use router::{RouteEntry, RouteMatch, Router, RouterBuilder};
pub use template::{PathTemplate, Segment};
