//! Process lifecycle: ordered startup, signals, and graceful shutdown.
//!
//! # Flow
//! ```text
//! startup.rs   validated config → metrics → backend supervisors
//!              → route table + pipeline → TLS → both listeners
//! signals.rs   SIGINT | SIGTERM | SIGHUP → Shutdown::trigger
//! shutdown.rs  broadcast → listeners close and drain (30 s cap)
//!              → supervisors clear their handles and stop
//! ```
//!
//! Backends are never awaited at startup: the listeners come up while the
//! supervisors are still connecting, and the readiness gate answers 503 in
//! the meantime.

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{http_connectors, run, StartupError};
