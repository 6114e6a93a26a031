//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection (secure or insecure listener)
//!     → listener.rs (accept loop, connection limits, transport tag)
//!     → tls.rs (handshake, secure listener only when configured)
//!     → connection.rs (tracking, idle watchdog, hyper serve)
//!     → Hand off to the axum router / pipeline
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - The idle watchdog is installed once per connection at accept time

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{serve_connection, ConnectionTracker};
pub use listener::{Listener, ListenerError};
pub use tls::{load_tls_config, TlsAcceptor};
