//! The request-dispatch pipeline.
//!
//! # Stages (fixed order, each may short-circuit to formatting)
//! ```text
//!  1. path capture          raw path recorded before anything rewrites it
//!  2. path sanitization     normalize::sanitize_path        (400 InvalidPath)
//!  3. content type          normalize::normalize_content_type
//!  4. live-route rewrite    normalize::LiveJobsRewrite, then route match
//!                                                           (404 / 405 / 415)
//!  5. transport security    security::transport             (403)
//!  6. header parsing        security::credentials           (400)
//!  7. readiness gate        health::readiness               (503)
//!  8. authentication        security::authentication        (401 / 503)
//!  9. context gathering     account + principal on the context
//! 10. metadata / authz      security::authorization         (403 / 503)
//! 11. dispatch              HandlerSet                      (501 if absent)
//! 12. formatting            response::ResponseEnvelope
//! 13. audit                 observability::audit, always, panics included
//! ```
//!
//! # Design Decisions
//! - One envelope and one audit record per request, however it ends
//! - Panics anywhere in stages 2-11 become a 500 and are still audited
//! - Backend handles are read at use; nothing is cached across requests

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Uri};
use axum::response::Response;
use futures_util::FutureExt;
use tracing::{debug, error, warn};

use crate::backend::BackendRegistry;
use crate::health::readiness::{admit, Admission};
use crate::http::error::GatewayError;
use crate::http::handler::HandlerSet;
use crate::http::normalize::{normalize_content_type, parse_query, sanitize_path, LiveJobsRewrite};
use crate::http::request::{ConnectionMeta, RequestContext};
use crate::http::response::ResponseEnvelope;
use crate::observability::audit::{AuditRecord, AuditSink};
use crate::observability::metrics;
use crate::routing::{PatternError, RouteMiss, RouteTable};
use crate::security::credentials::{is_presigned, parse_credentials, parse_date};
use crate::security::{authorize, enforce_secure_transport, load_metadata, Authenticator};

/// Header carrying the request id set by the tower-http layer.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tunables of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub server_name: String,
    pub max_request_age: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            server_name: "storage-gateway".to_string(),
            max_request_age: Duration::from_secs(300),
        }
    }
}

pub struct Pipeline {
    routes: Arc<RouteTable>,
    registry: Arc<BackendRegistry>,
    handlers: HandlerSet,
    audit: Arc<dyn AuditSink>,
    authenticator: Authenticator,
    live_jobs: LiveJobsRewrite,
    server_name: HeaderValue,
}

impl Pipeline {
    pub fn new(
        routes: Arc<RouteTable>,
        registry: Arc<BackendRegistry>,
        handlers: HandlerSet,
        audit: Arc<dyn AuditSink>,
        settings: PipelineSettings,
    ) -> Result<Self, PatternError> {
        let authenticator = Authenticator::new(
            Arc::clone(&registry.auth_cache),
            Arc::clone(&registry.key_directory),
            settings.max_request_age,
        );
        let server_name = HeaderValue::from_str(&settings.server_name)
            .unwrap_or_else(|_| HeaderValue::from_static("storage-gateway"));
        Ok(Self {
            routes,
            registry,
            handlers,
            audit,
            authenticator,
            live_jobs: LiveJobsRewrite::new()?,
            server_name,
        })
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Run one request through every stage. Always produces a response.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let (parts, body) = request.into_parts();
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        // Stage 1: path capture.
        let mut ctx = RequestContext::new(
            request_id,
            parts.method.clone(),
            parts.uri.path().to_string(),
            parts.headers.clone(),
            parts.extensions.get::<ConnectionMeta>(),
        );

        let outcome = AssertUnwindSafe(self.run(&mut ctx, &parts.uri, body))
            .catch_unwind()
            .await;
        let (envelope, failure) = match outcome {
            Ok(Ok(envelope)) => (envelope, None),
            Ok(Err(err)) => (ResponseEnvelope::from_error(&err), Some(err)),
            Err(panic) => {
                let err = GatewayError::Internal(panic_message(panic.as_ref()));
                error!(req_id = %ctx.request_id, route = ctx.route_name(), error = %err, "request panicked");
                (ResponseEnvelope::from_error(&err), Some(err))
            }
        };

        // Stage 12: formatting.
        let envelope = envelope.with_header(header::SERVER, self.server_name.clone());
        if envelope.status.is_server_error() {
            warn!(
                req_id = %ctx.request_id,
                route = ctx.route_name(),
                status = envelope.status.as_u16(),
                error = %failure.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                "server error response"
            );
        }

        // Stage 13: audit.
        let elapsed = ctx.started.elapsed();
        metrics::record_request(ctx.route_name(), envelope.status.as_u16(), elapsed);
        self.audit.record(audit_record(&ctx, &envelope, failure.as_ref(), elapsed));

        envelope.into_response()
    }

    async fn run(
        &self,
        ctx: &mut RequestContext,
        uri: &Uri,
        body: Body,
    ) -> Result<ResponseEnvelope, GatewayError> {
        // Stages 2-4.
        ctx.path = sanitize_path(&ctx.raw_path)?;
        ctx.content_type = ctx.header("content-type").map(normalize_content_type);
        ctx.query = parse_query(uri.query());
        ctx.dispatch_path = self
            .live_jobs
            .rewrite(&ctx.path, &ctx.query)
            .unwrap_or_else(|| ctx.path.clone());

        let matched = self
            .routes
            .lookup(&ctx.method, &ctx.dispatch_path, ctx.content_type.as_deref())
            .map_err(|miss| route_miss(miss, ctx))?;
        let route = Arc::clone(&matched.route);
        ctx.account = matched.params.get("account").cloned();
        ctx.params = matched.params;
        ctx.route = Some(Arc::clone(&route));

        // Stage 5.
        ctx.presigned = is_presigned(&ctx.query);
        enforce_secure_transport(ctx.transport, ctx.presigned)?;

        // Stage 6.
        ctx.date = parse_date(&ctx.headers)?;
        let target = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
        ctx.credentials =
            parse_credentials(&ctx.method, target, &ctx.headers, &ctx.query, ctx.presigned)?;

        // Stage 7.
        if let Admission::Rejected(kind) = admit(route.required_backends, self.registry.as_ref()) {
            error!(req_id = %ctx.request_id, route = %route.name, backend = %kind, "required backend unavailable");
            metrics::record_readiness_rejection(kind);
            return Err(GatewayError::ServiceUnavailable(kind));
        }

        // Stages 8-9.
        ctx.principal = self.authenticator.authenticate(ctx, SystemTime::now()).await?;
        debug!(
            req_id = %ctx.request_id,
            route = %route.name,
            account = ctx.account.as_deref().unwrap_or_default(),
            caller = %ctx.caller().unwrap_or_default(),
            "authenticated"
        );

        // Stage 10.
        if route.loads_metadata {
            ctx.metadata = load_metadata(&self.registry.metadata_index, &ctx.dispatch_path).await?;
        }
        authorize(
            &route,
            ctx.principal.as_ref(),
            ctx.account.as_deref(),
            ctx.metadata.as_ref(),
            &ctx.path,
        )?;

        // Stage 11.
        let handler = self
            .handlers
            .get(&route.name)
            .cloned()
            .ok_or_else(|| GatewayError::NotImplemented(route.name.clone()))?;
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|e| GatewayError::Internal(format!("reading request body: {e}")))?;
        let reply = handler.handle(ctx, body).await?;
        Ok(ResponseEnvelope::from_reply(reply))
    }
}

fn route_miss(miss: RouteMiss, ctx: &RequestContext) -> GatewayError {
    match miss {
        RouteMiss::NotFound => GatewayError::ResourceNotFound(ctx.path.clone()),
        RouteMiss::MethodNotAllowed { allowed } => GatewayError::BadMethod {
            method: ctx.method.clone(),
            path: ctx.path.clone(),
            allowed,
        },
        RouteMiss::UnsupportedMediaType => GatewayError::UnsupportedMediaType(
            ctx.content_type.clone().unwrap_or_else(|| "(none)".to_string()),
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}

fn audit_record(
    ctx: &RequestContext,
    envelope: &ResponseEnvelope,
    failure: Option<&GatewayError>,
    elapsed: Duration,
) -> AuditRecord {
    AuditRecord {
        audit: true,
        name: ctx.route_name().to_string(),
        req_id: ctx.request_id.clone(),
        method: ctx.method.to_string(),
        raw_path: ctx.raw_path.clone(),
        path: ctx.path.clone(),
        account: ctx.account.clone(),
        caller: ctx.caller(),
        status: envelope.status.as_u16(),
        latency_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        response_bytes: envelope.body_len(),
        error: failure.map(|e| e.to_string()),
        remote_address: ctx.peer.map(|p| p.ip().to_string()),
        transport: ctx.transport,
    }
}
