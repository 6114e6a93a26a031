//! The gateway's single internal error representation and its wire mapping.

use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;

use crate::backend::BackendKind;
use crate::http::handler::HandlerError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidPath(String),
    #[error("{0}")]
    InvalidDate(String),
    #[error("{0}")]
    InvalidAuthorizationHeader(String),
    #[error("{0} requires authentication")]
    AuthorizationRequired(String),
    #[error("{0}")]
    InvalidSignature(String),
    #[error("{0}")]
    RequestExpired(String),
    #[error("secure transport required")]
    SecureTransportRequired,
    #[error("{caller} is not allowed to access {account}")]
    AccountMismatch { caller: String, account: String },
    #[error("{caller} is not allowed to {action} {resource}")]
    AuthorizationFailed {
        caller: String,
        action: String,
        resource: String,
    },
    #[error("{0} does not exist")]
    ResourceNotFound(String),
    #[error("{method} is not allowed on {path}")]
    BadMethod {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },
    #[error("{0} is not an acceptable content type")]
    UnsupportedMediaType(String),
    #[error("{0} is not implemented")]
    NotImplemented(String),
    /// Carries the unready backend for logs only.
    #[error("{0} unavailable")]
    ServiceUnavailable(BackendKind),
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidPath(_)
            | GatewayError::InvalidDate(_)
            | GatewayError::InvalidAuthorizationHeader(_) => StatusCode::BAD_REQUEST,
            GatewayError::AuthorizationRequired(_)
            | GatewayError::InvalidSignature(_)
            | GatewayError::RequestExpired(_) => StatusCode::UNAUTHORIZED,
            GatewayError::SecureTransportRequired
            | GatewayError::AccountMismatch { .. }
            | GatewayError::AuthorizationFailed { .. } => StatusCode::FORBIDDEN,
            GatewayError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::BadMethod { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GatewayError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            GatewayError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Handler(e) => e.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code sent in the body.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidPath(_) => "InvalidPath",
            GatewayError::InvalidDate(_) => "InvalidDate",
            GatewayError::InvalidAuthorizationHeader(_) => "InvalidAuthorizationHeader",
            GatewayError::AuthorizationRequired(_) => "AuthorizationRequired",
            GatewayError::InvalidSignature(_) => "InvalidSignature",
            GatewayError::RequestExpired(_) => "RequestExpired",
            GatewayError::SecureTransportRequired => "SecureTransportRequired",
            GatewayError::AccountMismatch { .. } | GatewayError::AuthorizationFailed { .. } => {
                "AuthorizationFailed"
            }
            GatewayError::ResourceNotFound(_) => "ResourceNotFound",
            GatewayError::BadMethod { .. } => "BadMethod",
            GatewayError::UnsupportedMediaType(_) => "UnsupportedMediaType",
            GatewayError::NotImplemented(_) => "NotImplemented",
            GatewayError::ServiceUnavailable(_) => "ServiceUnavailable",
            GatewayError::Handler(_) => "HandlerError",
            GatewayError::Internal(_) => "InternalError",
        }
    }

    /// Message safe to send to the caller.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::ServiceUnavailable(_) => "service unavailable".to_string(),
            GatewayError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }

    /// Headers this error adds to the response.
    pub fn headers(&self) -> HeaderMap {
        match self {
            GatewayError::BadMethod { allowed, .. } => {
                let mut headers = HeaderMap::new();
                let list = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                if let Ok(value) = HeaderValue::from_str(&list) {
                    headers.insert(header::ALLOW, value);
                }
                headers
            }
            GatewayError::ServiceUnavailable(_) => {
                let mut headers = HeaderMap::new();
                headers.insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
                headers
            }
            GatewayError::Handler(e) => e.headers.clone(),
            _ => HeaderMap::new(),
        }
    }

    /// JSON body: handler errors supply their own (or `{"message"}`),
    /// everything else is `{"code","message"}`.
    pub fn body(&self) -> Value {
        match self {
            GatewayError::Handler(e) => e
                .body
                .clone()
                .unwrap_or_else(|| json!({ "message": e.message })),
            other => json!({ "code": other.code(), "message": other.public_message() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_unavailable_hides_backend() {
        let err = GatewayError::ServiceUnavailable(BackendKind::AuthCache);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = err.body().to_string();
        assert!(!body.contains("auth"));
        assert!(err.to_string().contains("auth_cache"));
    }

    #[test]
    fn account_mismatch_reports_authorization_failed() {
        let err = GatewayError::AccountMismatch {
            caller: "bob".into(),
            account: "mark".into(),
        };
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.body()["code"], "AuthorizationFailed");
    }

    #[test]
    fn bad_method_lists_allowed() {
        let err = GatewayError::BadMethod {
            method: Method::PATCH,
            path: "/mark".into(),
            allowed: vec![Method::GET, Method::PUT],
        };
        assert_eq!(err.headers()[header::ALLOW], "GET, PUT");
    }

    #[test]
    fn handler_error_defaults() {
        let err = GatewayError::from(HandlerError::new("disk on fire"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body(), json!({ "message": "disk on fire" }));

        let err = GatewayError::from(
            HandlerError::new("gone")
                .with_status(StatusCode::GONE)
                .with_body(json!({ "code": "Gone" })),
        );
        assert_eq!(err.status(), StatusCode::GONE);
        assert_eq!(err.body(), json!({ "code": "Gone" }));
    }

    #[test]
    fn internal_detail_stays_in_logs() {
        let err = GatewayError::Internal("handler panicked: index out of bounds".into());
        assert_eq!(err.body()["message"], "internal error");
        assert_eq!(err.body()["code"], "InternalError");
    }
}
