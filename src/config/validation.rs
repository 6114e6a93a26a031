//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and backend URLs parse
//! - Validate value ranges (timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::backend::BackendKind;
use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (field, address) in [
        ("listener.secure_address", &config.listener.secure_address),
        ("listener.insecure_address", &config.listener.insecure_address),
    ] {
        if address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(field, format!("invalid socket address '{address}'")));
        }
    }
    if config.listener.secure_address == config.listener.insecure_address {
        errors.push(ValidationError::new(
            "listener",
            "secure and insecure listeners must use different addresses",
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }

    for (field, value) in [
        ("timeouts.socket_idle_secs", config.timeouts.socket_idle_secs),
        ("timeouts.max_request_age_secs", config.timeouts.max_request_age_secs),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    for kind in BackendKind::ALL {
        let endpoint = config.backends.endpoint(kind);
        let field = format!("backends.{kind}");
        match Url::parse(&endpoint.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                format!("{field}.url"),
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(format!("{field}.url"), e.to_string())),
        }
        if endpoint.probe_interval_secs == 0 {
            errors.push(ValidationError::new(
                format!("{field}.probe_interval_secs"),
                "must be greater than 0",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
