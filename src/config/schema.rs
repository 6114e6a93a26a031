//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;

/// Root configuration for the storage gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Value of the `Server` response header.
    pub server_name: String,

    /// Listener configuration (secure and insecure endpoints, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Backend endpoints and reconnect tuning.
    pub backends: BackendsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server_name: "storage-gateway".to_string(),
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            backends: BackendsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Address of the listener that requires transport security.
    pub secure_address: String,

    /// Address of the clear-text listener (presigned requests only).
    pub insecure_address: String,

    /// Optional TLS for the secure listener. Without it the secure listener
    /// speaks plain HTTP and TLS is terminated in front of the gateway.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent connections per listener (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            secure_address: "0.0.0.0:8443".to_string(),
            insecure_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the secure listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Idle seconds before a connection with an unfinished request is closed.
    /// Overridden by the `SOCKET_TIMEOUT` environment variable.
    pub socket_idle_secs: u64,

    /// Maximum allowed skew between a signed request's date and now.
    pub max_request_age_secs: u64,

    /// Backend connect timeout in seconds.
    pub connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            socket_idle_secs: 120,
            max_request_age_secs: 300,
            connect_secs: 5,
        }
    }
}

/// Where one backend lives.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendEndpoint {
    /// Base URL of the backend service.
    pub url: String,

    /// Seconds between liveness probes of a connected client.
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
}

fn default_probe_interval() -> u64 {
    5
}

impl BackendEndpoint {
    fn local(port: u16) -> Self {
        Self {
            url: format!("http://127.0.0.1:{port}/"),
            probe_interval_secs: default_probe_interval(),
        }
    }
}

/// Backend endpoints, one per kind.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub placement: BackendEndpoint,
    pub metadata_index: BackendEndpoint,
    pub auth_cache: BackendEndpoint,
    pub job_execution: BackendEndpoint,
    pub streaming: BackendEndpoint,
    pub key_directory: BackendEndpoint,

    /// Delay before reconnecting fixed-delay backends, in milliseconds.
    pub retry_delay_ms: u64,
}

impl BackendsConfig {
    pub fn endpoint(&self, kind: BackendKind) -> &BackendEndpoint {
        match kind {
            BackendKind::Placement => &self.placement,
            BackendKind::MetadataIndex => &self.metadata_index,
            BackendKind::AuthCache => &self.auth_cache,
            BackendKind::JobExecution => &self.job_execution,
            BackendKind::Streaming => &self.streaming,
            BackendKind::KeyDirectory => &self.key_directory,
        }
    }
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            placement: BackendEndpoint::local(2020),
            metadata_index: BackendEndpoint::local(2021),
            auth_cache: BackendEndpoint::local(2022),
            job_execution: BackendEndpoint::local(2023),
            streaming: BackendEndpoint::local(2024),
            key_directory: BackendEndpoint::local(2025),
            retry_delay_ms: 1000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
