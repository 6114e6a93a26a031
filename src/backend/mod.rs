//! Backend connection supervision subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     registry.rs (six empty handles)
//!     → supervisor.rs per kind (connect via client.rs connector)
//!     → handle.rs install(ticket, client) → generation + 1
//!
//! Client failure:
//!     client.closed() resolves
//!     → handle.rs clear(generation)
//!     → resilience::retries policy wait
//!     → next connect attempt
//!
//! Requests:
//!     health::readiness reads registry.is_ready(kind), lock-free
//!     security/* read handle.current() for domain calls
//! ```
//!
//! # Design Decisions
//! - No globals: the registry is built once and passed through construction
//! - At most one visible client per kind, enforced by attempt tickets
//! - Backend failures degrade the service; they never crash the process

pub mod client;
pub mod handle;
pub mod http_client;
pub mod kind;
pub mod registry;
pub mod supervisor;

pub use client::{BackendClient, BackendConnector, ClientEvent, ConnectError};
pub use handle::ConnectionHandle;
pub use kind::{BackendKind, BackendSet};
pub use registry::{BackendConnectors, BackendRegistry};
pub use supervisor::{BackendSupervisor, SupervisorState};
