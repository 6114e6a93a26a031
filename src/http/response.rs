//! Response envelope: the only writer of responses.
//!
//! # Responsibilities
//! - Serialize every body as JSON (binary payloads as a base64 string)
//! - Add `Content-Type`, exact `Content-Length` and `Content-MD5`
//! - Translate `GatewayError` into status, headers and body
//!
//! # Design Decisions
//! - Built exactly once per request, right before it is written
//! - The digest covers the encoded bytes actually sent
//! - Empty replies carry no body and `Content-Length: 0`

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest, Md5};
use serde_json::Value;

use crate::http::error::GatewayError;
use crate::http::handler::{Reply, ReplyBody};

/// Headers the envelope owns; values supplied by handlers are replaced.
const ENVELOPE_HEADERS: [HeaderName; 3] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    HeaderName::from_static("content-md5"),
];

/// A fully formatted response.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ResponseEnvelope {
    pub fn from_reply(reply: Reply) -> Self {
        let body = match reply.body {
            ReplyBody::Empty => None,
            ReplyBody::Json(value) => Some(value),
            ReplyBody::Binary(bytes) => Some(Value::String(STANDARD.encode(&bytes))),
        };
        Self::build(reply.status, reply.headers, body)
    }

    pub fn from_error(error: &GatewayError) -> Self {
        Self::build(error.status(), error.headers(), Some(error.body()))
    }

    fn build(status: StatusCode, extra: HeaderMap, body: Option<Value>) -> Self {
        let body = body.map(|value| Bytes::from(value.to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in extra.iter() {
            if !ENVELOPE_HEADERS.contains(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        let length = body.as_ref().map_or(0, Bytes::len);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        if let Some(bytes) = &body {
            if let Ok(value) = HeaderValue::from_str(&content_md5(bytes)) {
                headers.insert(HeaderName::from_static("content-md5"), value);
            }
        }

        Self {
            status,
            headers,
            body,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body_len(&self) -> usize {
        self.body.as_ref().map_or(0, Bytes::len)
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(self.body.map_or_else(Body::empty, Body::from));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Base64 MD5 of `bytes`, as sent in `Content-MD5`.
pub fn content_md5(bytes: &[u8]) -> String {
    STANDARD.encode(Md5::digest(bytes))
}
