//! Storage Gateway
//!
//! HTTP front door of a multi-tenant object store, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌───────────────────────────────────────────────────────┐
//!                          │                    STORAGE GATEWAY                    │
//!                          │                                                       │
//!     Client Request       │  ┌──────────┐   ┌───────────┐   ┌─────────────────┐   │
//!     ─────────────────────┼─▶│   net    │──▶│   http    │──▶│    routing      │   │
//!     (secure / insecure)  │  │ listener │   │ normalize │   │  route table    │   │
//!                          │  └──────────┘   └───────────┘   └───────┬─────────┘   │
//!                          │                                         ▼             │
//!                          │  ┌──────────┐   ┌───────────┐   ┌─────────────────┐   │
//!                          │  │ security │◀──│  health   │◀──│   transport +   │   │
//!                          │  │ authn/z  │   │ readiness │   │   credentials   │   │
//!                          │  └────┬─────┘   └───────────┘   └─────────────────┘   │
//!                          │       ▼                                               │
//!     Client Response      │  ┌──────────┐   ┌───────────┐        ┌────────────┐   │
//!     ◀────────────────────┼──│ envelope │◀──│  handler  │───────▶│  backend   │───┼──▶ Backends
//!                          │  │ + audit  │   │           │        │ supervisors│   │
//!                          │  └──────────┘   └───────────┘        └────────────┘   │
//!                          └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use storage_gateway::config::{
    load_config, parse_config, with_listener_ports, ConfigError, GatewayConfig,
};
use storage_gateway::http::HandlerSet;
use storage_gateway::lifecycle;
use storage_gateway::observability::{logging, TracingAuditSink};

#[derive(Parser)]
#[command(name = "storage-gateway")]
#[command(about = "HTTP front door of the object store", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Override the secure listener port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the insecure listener port.
    #[arg(short, long)]
    insecure_port: Option<u16>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn configure(cli: &Cli) -> Result<GatewayConfig, ConfigError> {
    let config = match &cli.file {
        Some(path) => load_config(path)?,
        None => parse_config("")?,
    };
    with_listener_ports(config, cli.port, cli.insecure_port)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = configure(&cli)?;
    logging::init(cli.verbose, &config.observability.log_level)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "storage-gateway starting");
    tracing::info!(
        secure_address = %config.listener.secure_address,
        insecure_address = %config.listener.insecure_address,
        tls = config.listener.tls.is_some(),
        socket_idle_secs = config.timeouts.socket_idle_secs,
        "Configuration loaded"
    );

    let connectors = lifecycle::http_connectors(&config)?;
    lifecycle::run(config, connectors, HandlerSet::new(), Arc::new(TracingAuditSink)).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
