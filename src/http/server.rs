//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the axum Router that hands every request to the pipeline
//! - Wire up middleware (request id, tracing)
//! - Run the accept loop for one listener
//! - Drain connections on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    response::Response,
    routing::any,
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::http::pipeline::{Pipeline, REQUEST_ID_HEADER};
use crate::http::request::ConnectionMeta;
use crate::lifecycle::Shutdown;
use crate::net::{serve_connection, ConnectionTracker, Listener, ListenerError, TlsAcceptor};

/// How long shutdown waits for open connections to finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the Axum router with all middleware layers.
pub fn build_router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/{*path}", any(dispatch))
        .route("/", any(dispatch))
        .with_state(pipeline)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                req_id = %request_id,
            )
        }))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn dispatch(State(pipeline): State<Arc<Pipeline>>, request: Request) -> Response {
    pipeline.handle(request).await
}

/// Serves the gateway on one or more listeners.
pub struct GatewayServer {
    router: Router,
    idle_timeout: Duration,
    tracker: ConnectionTracker,
}

impl GatewayServer {
    pub fn new(pipeline: Arc<Pipeline>, idle_timeout: Duration) -> Self {
        Self {
            router: build_router(pipeline),
            idle_timeout,
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn open_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Accept connections on `listener` until `shutdown` triggers, then wait
    /// for its connections to drain.
    pub async fn serve(
        &self,
        listener: Listener,
        tls: Option<TlsAcceptor>,
        shutdown: &Shutdown,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Accept)?;
        let transport = listener.transport();
        tracing::info!(address = %addr, transport = transport.as_str(), tls = tls.is_some(), "HTTP server starting");

        let mut stop = shutdown.subscribe();
        while !shutdown.is_triggered() {
            let (stream, peer, permit) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(address = %addr, error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        continue;
                    }
                },
                _ = stop.recv() => break,
            };

            let guard = self.tracker.track();
            let meta = ConnectionMeta {
                peer: Some(peer),
                transport,
                connection_id: guard.id().as_u64(),
            };
            let router = self.router.clone();
            let idle_timeout = self.idle_timeout;
            let tls = tls.clone();
            let connection_shutdown = shutdown.subscribe();

            tokio::spawn(async move {
                let _permit = permit;
                let _guard = guard;
                match tls {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(stream) => {
                            serve_connection(stream, router, meta, idle_timeout, connection_shutdown).await
                        }
                        Err(e) => {
                            tracing::debug!(peer = %peer, error = %e, "TLS handshake failed")
                        }
                    },
                    None => serve_connection(stream, router, meta, idle_timeout, connection_shutdown).await,
                }
            });
        }

        listener.close();
        tracing::info!(address = %addr, open = self.tracker.active_count(), "Listener stopped, draining");
        if tokio::time::timeout(DRAIN_TIMEOUT, self.tracker.wait_for_drain()).await.is_err() {
            tracing::warn!(open = self.tracker.active_count(), "Drain timed out");
        }
        tracing::info!(address = %addr, "HTTP server stopped");
        Ok(())
    }
}
