//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Start the backend supervisors
//! - Bind both listeners and begin accepting traffic
//! - Wait for shutdown and stop everything in order
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Backends connect in the background; the gateway serves (and answers
//!   503 where needed) while they come up
//! - Listeners start last

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::backend::client::ConnectError;
use crate::backend::http_client::HttpBackendConnector;
use crate::backend::{BackendConnectors, BackendKind, BackendRegistry};
use crate::config::GatewayConfig;
use crate::http::{GatewayServer, HandlerSet, Pipeline, PipelineSettings, Transport};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::net::{load_tls_config, Listener, ListenerError, TlsAcceptor};
use crate::observability::audit::AuditSink;
use crate::observability::metrics;
use crate::routing::{PatternError, RouteTable};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("backend connector: {0}")]
    Connector(#[from] ConnectError),
    #[error("route table: {0}")]
    Routes(#[from] PatternError),
    #[error("listener: {0}")]
    Listener(#[from] ListenerError),
    #[error("tls: {0}")]
    Tls(std::io::Error),
    #[error("metrics: {0}")]
    Metrics(String),
}

/// HTTP connectors for every backend kind, from configuration.
pub fn http_connectors(config: &GatewayConfig) -> Result<BackendConnectors, ConnectError> {
    let timeout = Duration::from_secs(config.timeouts.connect_secs);
    let connector = |kind: BackendKind| {
        HttpBackendConnector::new(kind, config.backends.endpoint(kind), timeout).map(Arc::new)
    };
    Ok(BackendConnectors {
        placement: connector(BackendKind::Placement)?,
        metadata_index: connector(BackendKind::MetadataIndex)?,
        auth_cache: connector(BackendKind::AuthCache)?,
        job_execution: connector(BackendKind::JobExecution)?,
        streaming: connector(BackendKind::Streaming)?,
        key_directory: connector(BackendKind::KeyDirectory)?,
    })
}

/// Run the gateway until a shutdown signal arrives.
pub async fn run(
    config: GatewayConfig,
    connectors: BackendConnectors,
    handlers: HandlerSet,
    audit: Arc<dyn AuditSink>,
) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|e: std::net::AddrParseError| StartupError::Metrics(e.to_string()))?;
        metrics::init_metrics(addr).map_err(|e| StartupError::Metrics(e.to_string()))?;
    }

    let shutdown = Arc::new(Shutdown::new());
    let registry = Arc::new(BackendRegistry::new());
    let supervisors = registry.spawn_supervisors(
        connectors,
        Duration::from_millis(config.backends.retry_delay_ms),
        &shutdown,
    );
    tracing::info!(count = supervisors.len(), "Backend supervisors started");

    let routes = Arc::new(RouteTable::builtin()?);
    tracing::info!(routes = routes.routes().count(), handlers = handlers.len(), "Route table built");

    let pipeline = Arc::new(Pipeline::new(
        routes,
        Arc::clone(&registry),
        handlers,
        audit,
        PipelineSettings {
            server_name: config.server_name.clone(),
            max_request_age: Duration::from_secs(config.timeouts.max_request_age_secs),
        },
    )?);

    let tls = match &config.listener.tls {
        Some(tls) => Some(TlsAcceptor::new(
            load_tls_config(tls).await.map_err(StartupError::Tls)?,
        )),
        None => None,
    };
    let max_connections = config.listener.max_connections;
    let secure = Listener::bind(&config.listener.secure_address, max_connections, Transport::Secure).await?;
    let insecure =
        Listener::bind(&config.listener.insecure_address, max_connections, Transport::Insecure).await?;

    let server = GatewayServer::new(pipeline, Duration::from_secs(config.timeouts.socket_idle_secs));
    let signals = spawn_signal_handler(Arc::clone(&shutdown));

    let served = tokio::try_join!(
        server.serve(secure, tls, &shutdown),
        server.serve(insecure, None, &shutdown),
    );
    if served.is_err() {
        shutdown.trigger();
    }
    signals.abort();

    for supervisor in supervisors {
        if let Err(e) = supervisor.await {
            tracing::warn!(error = %e, "Backend supervisor ended abnormally");
        }
    }
    tracing::info!("Gateway stopped");
    served.map(|_| ()).map_err(StartupError::from)
}
