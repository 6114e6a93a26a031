//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Backend supervisor:
//!     → timeouts.rs (bound each connect attempt)
//!     → On failure: retries.rs (per-kind retry policy)
//!     → next attempt, forever
//! ```
//!
//! # Design Decisions
//! - Every connect attempt has a deadline
//! - Retry policy is a table keyed by backend kind, not a formula
//! - Retries never give up; the gateway runs degraded instead of exiting

pub mod retries;
pub mod timeouts;
