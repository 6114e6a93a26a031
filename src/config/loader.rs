//! Configuration loading from disk and environment.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `timeouts.socket_idle_secs`.
pub const SOCKET_TIMEOUT_ENV: &str = "SOCKET_TIMEOUT";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { name: &'static str, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { name, value } => {
                write!(f, "Invalid value '{}' for environment variable {}", value, name)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parse, apply environment overrides, and validate.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let mut config: GatewayConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply overrides read through `lookup`. Unset variables leave the file's value.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(SOCKET_TIMEOUT_ENV) {
        config.timeouts.socket_idle_secs =
            value.trim().parse().map_err(|_| ConfigError::Env {
                name: SOCKET_TIMEOUT_ENV,
                value,
            })?;
    }
    Ok(())
}

/// Replace listener ports from the command line, then validate again.
pub fn with_listener_ports(
    mut config: GatewayConfig,
    secure: Option<u16>,
    insecure: Option<u16>,
) -> Result<GatewayConfig, ConfigError> {
    if let Some(port) = secure {
        set_port(&mut config.listener.secure_address, port);
    }
    if let Some(port) = insecure {
        set_port(&mut config.listener.insecure_address, port);
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Unparseable addresses are left alone for validation to report.
fn set_port(address: &mut String, port: u16) {
    if let Ok(mut addr) = address.parse::<SocketAddr>() {
        addr.set_port(port);
        *address = addr.to_string();
    }
}
