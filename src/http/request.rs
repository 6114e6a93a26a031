//! Per-request state.
//!
//! # Responsibilities
//! - Describe the connection a request arrived on (`ConnectionMeta`)
//! - Carry everything the pipeline learns about one request
//!
//! # Design Decisions
//! - `RequestContext` is owned by the request's future; never shared
//! - A request without `ConnectionMeta` is treated as insecure

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use axum::http::{HeaderMap, Method};
use serde::Serialize;

use crate::backend::client::EntryMetadata;
use crate::routing::RouteSpec;
use crate::security::{PresentedCredentials, Principal};

/// Which listener a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Secure,
    Insecure,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Secure => "secure",
            Transport::Insecure => "insecure",
        }
    }
}

/// Inserted into every request's extensions by the listener.
#[derive(Debug, Clone)]
pub struct ConnectionMeta {
    pub peer: Option<SocketAddr>,
    pub transport: Transport,
    pub connection_id: u64,
}

/// Everything known about one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    /// Path exactly as received, before any normalization.
    pub raw_path: String,
    /// Canonical path.
    pub path: String,
    /// Path used for route matching (differs after the live-jobs rewrite).
    pub dispatch_path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub content_type: Option<String>,
    pub transport: Transport,
    pub peer: Option<SocketAddr>,
    pub connection_id: Option<u64>,
    /// Query carries both `signature` and `expires`.
    pub presigned: bool,
    pub date: Option<SystemTime>,
    pub credentials: Option<PresentedCredentials>,
    pub route: Option<Arc<RouteSpec>>,
    pub params: HashMap<String, String>,
    pub account: Option<String>,
    pub principal: Option<Principal>,
    pub metadata: Option<EntryMetadata>,
    pub started: Instant,
}

impl RequestContext {
    pub fn new(
        request_id: String,
        method: Method,
        raw_path: String,
        headers: HeaderMap,
        connection: Option<&ConnectionMeta>,
    ) -> Self {
        Self {
            request_id,
            method,
            path: raw_path.clone(),
            dispatch_path: raw_path.clone(),
            raw_path,
            query: Vec::new(),
            headers,
            content_type: None,
            transport: connection.map_or(Transport::Insecure, |c| c.transport),
            peer: connection.and_then(|c| c.peer),
            connection_id: connection.map(|c| c.connection_id),
            presigned: false,
            date: None,
            credentials: None,
            route: None,
            params: HashMap::new(),
            account: None,
            principal: None,
            metadata: None,
            started: Instant::now(),
        }
    }

    /// Matched route name, or `unknown` before (or without) a match.
    pub fn route_name(&self) -> &str {
        self.route.as_ref().map_or("unknown", |r| r.name.as_str())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// First value of a query key (case-sensitive).
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `account` or `account/user` of the authenticated principal.
    pub fn caller(&self) -> Option<String> {
        self.principal.as_ref().map(Principal::caller)
    }
}
