//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch path (after sanitization and live-route rewrite), method, content type
//!     → table.rs (ordered lookup)
//!     → matcher.rs (path pattern, content type)
//!     → Return: RouteMatch or RouteMiss (404 / 405 / 415)
//!
//! Route Compilation (at startup):
//!     RouteTable::builtin()
//!     → Compile path patterns to anchored regexes
//!     → Freeze as immutable Arc<RouteTable>
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod table;

pub use matcher::{ContentTypeMatch, PathPattern, PatternError};
pub use table::{base_backends, AuthAction, RouteMatch, RouteMiss, RouteSpec, RouteTable};
