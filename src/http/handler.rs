//! Route handler contract.
//!
//! Handlers are the collaborators that actually implement a route (directory
//! listing, object streaming, job submission). The gateway invokes at most one
//! handler per request and formats whatever it returns.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde_json::Value;

use crate::http::request::RequestContext;

/// Body of a successful reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Empty,
    Json(Value),
    /// Raw bytes; sent as a base64 JSON string.
    Binary(Bytes),
}

/// What a handler produces on success.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ReplyBody,
}

impl Reply {
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ReplyBody::Json(body),
        }
    }

    pub fn binary(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ReplyBody::Binary(body.into()),
        }
    }

    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ReplyBody::Empty,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// An error value returned by a handler. Opaque to the gateway.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Defaults to 500 when unset.
    pub status: Option<StatusCode>,
    /// Merged into the response.
    pub headers: HeaderMap,
    /// Pre-built body; a `{"message"}` object is used when absent.
    pub body: Option<Value>,
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            headers: HeaderMap::new(),
            body: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Implements one named route.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, ctx: &RequestContext, body: Bytes) -> Result<Reply, HandlerError>;
}

/// Handlers keyed by route name.
#[derive(Clone, Default)]
pub struct HandlerSet {
    handlers: HashMap<String, Arc<dyn RouteHandler>>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, route: impl Into<String>, handler: Arc<dyn RouteHandler>) {
        self.handlers.insert(route.into(), handler);
    }

    pub fn with(mut self, route: impl Into<String>, handler: Arc<dyn RouteHandler>) -> Self {
        self.insert(route, handler);
        self
    }

    pub fn get(&self, route: &str) -> Option<&Arc<dyn RouteHandler>> {
        self.handlers.get(route)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerSet").field("routes", &names).finish()
    }
}
