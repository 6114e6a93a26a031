//! Readiness subsystem.
//!
//! # Data Flow
//! ```text
//! Request with matched route
//!     → readiness.rs admit(route.required_backends, registry)
//!     → Allowed: continue to authentication
//!     → Rejected(kind): 503, logged once, never retried by the gateway
//! ```
//!
//! # Design Decisions
//! - Readiness is binary: a handle either holds a client or it does not
//! - Backend state transitions belong to `backend::supervisor`; this module
//!   only reads

pub mod readiness;

pub use readiness::{admit, Admission, Readiness};
