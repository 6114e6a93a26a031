//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::Notify;

use storage_gateway::backend::client::{
    AuthCache, BackendCallError, EntryMetadata, EntryType, JobExecution, KeyDirectory,
    MetadataIndex, Placement, Streaming,
};
use storage_gateway::backend::{
    BackendClient, BackendConnector, BackendConnectors, BackendKind, BackendRegistry, ClientEvent,
    ConnectError, ConnectionHandle,
};
use storage_gateway::http::{
    build_router, ConnectionMeta, HandlerError, HandlerSet, Pipeline, PipelineSettings, Reply,
    RequestContext, RouteHandler, Transport,
};
use storage_gateway::observability::{AuditRecord, AuditSink};
use storage_gateway::routing::RouteTable;
use storage_gateway::security::{Credentials, Principal};

/// In-memory backend implementing every client contract.
pub struct StubBackend {
    pub principal: Option<Principal>,
    pub entry_type: EntryType,
    pub auth_calls: AtomicUsize,
    pub metadata_calls: AtomicUsize,
    fail: Notify,
}

impl StubBackend {
    pub fn new(principal: Option<Principal>) -> Arc<Self> {
        Arc::new(Self {
            principal,
            entry_type: EntryType::Object,
            auth_calls: AtomicUsize::new(0),
            metadata_calls: AtomicUsize::new(0),
            fail: Notify::new(),
        })
    }

    pub fn owned_by(account: &str) -> Arc<Self> {
        Self::new(Some(Principal::account(account)))
    }

    /// Make `closed()` resolve with an error.
    pub fn fail(&self) {
        self.fail.notify_one();
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendClient for StubBackend {
    fn describe(&self) -> String {
        "stub".to_string()
    }

    async fn closed(&self) -> ClientEvent {
        self.fail.notified().await;
        ClientEvent::Error("injected failure".to_string())
    }
}

#[async_trait]
impl AuthCache for StubBackend {
    async fn authenticate(&self, _: &Credentials) -> Result<Principal, BackendCallError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        self.principal
            .clone()
            .ok_or_else(|| BackendCallError::Rejected("unknown key".to_string()))
    }
}

#[async_trait]
impl MetadataIndex for StubBackend {
    async fn entry(&self, key: &str) -> Result<Option<EntryMetadata>, BackendCallError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        let owner = key.trim_start_matches('/').split('/').next().unwrap_or_default();
        Ok(Some(EntryMetadata {
            key: key.to_string(),
            owner: owner.to_string(),
            entry_type: self.entry_type,
            etag: None,
        }))
    }
}

#[async_trait]
impl KeyDirectory for StubBackend {
    async fn resolve_token(&self, _: &str) -> Result<Option<Principal>, BackendCallError> {
        Ok(self.principal.clone())
    }
}

impl Placement for StubBackend {}
impl JobExecution for StubBackend {}
impl Streaming for StubBackend {}

fn install<C: ?Sized>(handle: &ConnectionHandle<C>, client: Arc<C>) {
    let ticket = handle.begin_attempt();
    handle.install(ticket, client);
}

/// A registry with `backend` installed for each of `kinds`.
pub fn registry_with(backend: &Arc<StubBackend>, kinds: &[BackendKind]) -> Arc<BackendRegistry> {
    let registry = BackendRegistry::new();
    for kind in kinds {
        match kind {
            BackendKind::Placement => install(&registry.placement, backend.clone() as Arc<dyn Placement>),
            BackendKind::MetadataIndex => {
                install(&registry.metadata_index, backend.clone() as Arc<dyn MetadataIndex>)
            }
            BackendKind::AuthCache => install(&registry.auth_cache, backend.clone() as Arc<dyn AuthCache>),
            BackendKind::JobExecution => {
                install(&registry.job_execution, backend.clone() as Arc<dyn JobExecution>)
            }
            BackendKind::Streaming => install(&registry.streaming, backend.clone() as Arc<dyn Streaming>),
            BackendKind::KeyDirectory => {
                install(&registry.key_directory, backend.clone() as Arc<dyn KeyDirectory>)
            }
        }
    }
    Arc::new(registry)
}

/// A registry with every backend ready.
pub fn ready_registry(backend: &Arc<StubBackend>) -> Arc<BackendRegistry> {
    registry_with(backend, &BackendKind::ALL)
}

/// Connector handing out `backend` after `failures` refused attempts.
pub struct StubConnector {
    pub backend: Arc<StubBackend>,
    failures: usize,
    pub attempts: AtomicUsize,
}

impl StubConnector {
    pub fn new(backend: Arc<StubBackend>, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            backend,
            failures,
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn next(&self) -> Result<Arc<StubBackend>, ConnectError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            Err(ConnectError::Unreachable {
                target: "stub".to_string(),
                reason: format!("refused attempt {attempt}"),
            })
        } else {
            Ok(Arc::clone(&self.backend))
        }
    }
}

macro_rules! stub_connector_for {
    ($($contract:ident),*) => {
        $(
            #[async_trait]
            impl BackendConnector<dyn $contract> for StubConnector {
                async fn connect(&self) -> Result<Arc<dyn $contract>, ConnectError> {
                    let client: Arc<dyn $contract> = self.next()?;
                    Ok(client)
                }
            }
        )*
    };
}

stub_connector_for!(Placement, MetadataIndex, AuthCache, JobExecution, Streaming, KeyDirectory);

/// The same connector for every kind.
pub fn connectors(connector: &Arc<StubConnector>) -> BackendConnectors {
    BackendConnectors {
        placement: connector.clone(),
        metadata_index: connector.clone(),
        auth_cache: connector.clone(),
        job_execution: connector.clone(),
        streaming: connector.clone(),
        key_directory: connector.clone(),
    }
}

/// Replies with the route name and account it was invoked for.
pub struct EchoHandler;

#[async_trait]
impl RouteHandler for EchoHandler {
    async fn handle(&self, ctx: &RequestContext, body: Bytes) -> Result<Reply, HandlerError> {
        Ok(Reply::json(
            StatusCode::OK,
            json!({
                "route": ctx.route_name(),
                "account": ctx.account,
                "caller": ctx.caller(),
                "body_len": body.len(),
            }),
        ))
    }
}

/// Replies with fixed bytes.
pub struct BinaryHandler(pub &'static [u8]);

#[async_trait]
impl RouteHandler for BinaryHandler {
    async fn handle(&self, _: &RequestContext, _: Bytes) -> Result<Reply, HandlerError> {
        Ok(Reply::binary(StatusCode::OK, Bytes::from_static(self.0)))
    }
}

pub struct PanicHandler;

#[async_trait]
impl RouteHandler for PanicHandler {
    async fn handle(&self, _: &RequestContext, _: Bytes) -> Result<Reply, HandlerError> {
        panic!("handler blew up")
    }
}

pub struct ConflictHandler;

#[async_trait]
impl RouteHandler for ConflictHandler {
    async fn handle(&self, _: &RequestContext, _: Bytes) -> Result<Reply, HandlerError> {
        Err(HandlerError::new("entry exists")
            .with_status(StatusCode::CONFLICT)
            .with_body(json!({ "code": "EntryExists", "message": "entry exists" })))
    }
}

/// Keeps every audit record.
#[derive(Default)]
pub struct RecordingAudit {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAudit {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, record: AuditRecord) {
        self.records.lock().unwrap().push(record);
    }
}

/// Handlers for the routes exercised by the integration tests.
pub fn handlers() -> HandlerSet {
    let echo: Arc<dyn RouteHandler> = Arc::new(EchoHandler);
    let mut set = HandlerSet::new();
    for route in ["GetStorage", "PutObject", "ListJobs", "ListLiveJobs", "GetPublicStorage", "GetRootDir"] {
        set.insert(route, Arc::clone(&echo));
    }
    set
}

pub struct Gateway {
    pub router: Router,
    pub pipeline: Arc<Pipeline>,
    pub audit: Arc<RecordingAudit>,
}

pub fn gateway(registry: Arc<BackendRegistry>, handlers: HandlerSet) -> Gateway {
    let audit = Arc::new(RecordingAudit::default());
    let pipeline = Arc::new(
        Pipeline::new(
            Arc::new(RouteTable::builtin().unwrap()),
            registry,
            handlers,
            audit.clone(),
            PipelineSettings::default(),
        )
        .unwrap(),
    );
    Gateway {
        router: build_router(Arc::clone(&pipeline)),
        pipeline,
        audit,
    }
}

/// A request carrying a fresh signature, received on `transport`.
pub fn signed_request(method: Method, uri: &str, transport: Transport) -> Request<Body> {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("host", "gateway.test")
        .header("date", httpdate::fmt_http_date(SystemTime::now()))
        .header(
            "authorization",
            r#"Signature keyId="/alice/keys/k1",algorithm="rsa-sha256",signature="c2lnbmVk""#,
        )
        .body(Body::empty())
        .unwrap();
    request.extensions_mut().insert(meta(transport));
    request
}

/// A request without credentials, received on `transport`.
pub fn anonymous_request(method: Method, uri: &str, transport: Transport) -> Request<Body> {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("host", "gateway.test")
        .body(Body::empty())
        .unwrap();
    request.extensions_mut().insert(meta(transport));
    request
}

pub fn meta(transport: Transport) -> ConnectionMeta {
    ConnectionMeta {
        peer: Some("10.0.0.7:41000".parse().unwrap()),
        transport,
        connection_id: 1,
    }
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
