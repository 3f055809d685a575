//! Parameter binding subsystem.
//!
//! # Data Flow
//! ```text
//! RequestBindings (from routing) + query string
//!     → params.rs (typed coercion via schema.rs field tables)
//!     → BoundFields (JSON object tree)
//!     → merged with the decoded body
//!     → request value handed to the method handler
//! ```

pub mod params;
pub mod schema;

pub use params::{BodyRule, BoundFields, ParamBinder, QueryFilter};
pub use schema::{FieldDescriptor, FieldKind, MessageSchema};
