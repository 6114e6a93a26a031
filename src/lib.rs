//! Storage Gateway Library
//!
//! Front door of a multi-tenant object store: request normalization,
//! routing, authentication, authorization, and supervision of the backend
//! clients every request depends on.

pub mod backend;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use http::{GatewayServer, Pipeline};
pub use lifecycle::Shutdown;
