//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Resolve the filter from `RUST_LOG`, `LOG_LEVEL`, `-v` flags and config
//!
//! # Design Decisions
//! - `RUST_LOG` wins, then `LOG_LEVEL`, then `-v`, then the config value
//! - Audit records share the subscriber under the `audit` target

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// The filter directive to use, given the environment and flags.
pub fn filter_directive(
    rust_log: Option<String>,
    log_level: Option<String>,
    verbosity: u8,
    configured: &str,
) -> String {
    if let Some(directive) = rust_log.filter(|s| !s.trim().is_empty()) {
        return directive;
    }
    if let Some(level) = log_level.filter(|s| !s.trim().is_empty()) {
        return level;
    }
    match verbosity {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(verbosity: u8, configured: &str) -> Result<(), TryInitError> {
    let directive = filter_directive(
        std::env::var("RUST_LOG").ok(),
        std::env::var("LOG_LEVEL").ok(),
        verbosity,
        configured,
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
}
