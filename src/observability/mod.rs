//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Request pipeline additionally produces:
//!     → audit.rs (one AuditRecord per request)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//!     → AuditSink (tracing target `audit` by default)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event
//! - Request ID flows through spans and audit records
//! - Metrics are cheap (atomic increments)

pub mod audit;
pub mod logging;
pub mod metrics;

pub use audit::{AuditRecord, AuditSink, TracingAuditSink};
