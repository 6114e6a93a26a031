//! Per-request audit records.
//!
//! Exactly one record is produced per request, whether it succeeded, failed
//! in a pipeline stage or panicked. Persisting records is the sink's concern.

use serde::Serialize;

use crate::http::request::Transport;

/// One completed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub audit: bool,
    /// Route name, or `unknown` when no route matched.
    pub name: String,
    pub req_id: String,
    pub method: String,
    /// Path as received.
    pub raw_path: String,
    /// Canonical path.
    pub path: String,
    pub account: Option<String>,
    pub caller: Option<String>,
    pub status: u16,
    pub latency_ms: u64,
    pub response_bytes: usize,
    /// Error message for failed requests.
    pub error: Option<String>,
    pub remote_address: Option<String>,
    pub transport: Transport,
}

/// Receives audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Emits each record as one `info` event on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        match serde_json::to_string(&record) {
            Ok(json) => tracing::info!(target: "audit", record = %json, "handled: {}", record.status),
            Err(e) => tracing::warn!(target: "audit", error = %e, "unserializable audit record"),
        }
    }
}
