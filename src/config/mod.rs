//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, SOCKET_TIMEOUT override)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → passed by value/Arc to startup wiring
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, with_listener_ports, ConfigError};
pub use schema::{
    BackendEndpoint, BackendsConfig, GatewayConfig, ListenerConfig, ObservabilityConfig,
    TimeoutConfig, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
