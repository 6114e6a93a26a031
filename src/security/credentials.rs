//! Structural parsing of request credentials.
//!
//! # Responsibilities
//! - Parse `Date` / `x-date` as HTTP-dates
//! - Parse `Authorization: Signature keyId=…,algorithm=…,signature=…`
//!   and `Authorization: Token <t>`
//! - Recognize presigned URLs and extract their parameters
//! - Build the string the signature was computed over
//!
//! # Design Decisions
//! - Parsing only; nothing here decides whether credentials are valid
//! - `x-date` takes precedence over `Date`

use std::time::SystemTime;

use axum::http::{HeaderMap, Method};
use serde::{Deserialize, Serialize};

use crate::http::error::GatewayError;

/// Headers covered by a signature that does not list any.
const DEFAULT_SIGNED_HEADERS: &str = "date";

/// Credentials sent to the auth cache for verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum Credentials {
    Signature {
        key_id: String,
        algorithm: String,
        signature: String,
        signing_string: String,
    },
    Presigned {
        key_id: String,
        algorithm: String,
        signature: String,
        /// Unix seconds after which the URL is no longer valid.
        expires: u64,
        signing_string: String,
    },
}

/// What a request presented, after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentedCredentials {
    /// Verified by the auth cache.
    Signed(Credentials),
    /// Verified by the key directory.
    Token(String),
}

/// True when the query carries both `signature` and `expires`.
pub fn is_presigned(query: &[(String, String)]) -> bool {
    let has = |key: &str| query.iter().any(|(k, _)| k == key);
    has("signature") && has("expires")
}

/// `x-date`, else `Date`, as a point in time.
pub fn parse_date(headers: &HeaderMap) -> Result<Option<SystemTime>, GatewayError> {
    let Some(value) = headers.get("x-date").or_else(|| headers.get("date")) else {
        return Ok(None);
    };
    let text = value
        .to_str()
        .map_err(|_| GatewayError::InvalidDate("date header is not text".to_string()))?;
    httpdate::parse_http_date(text)
        .map(Some)
        .map_err(|_| GatewayError::InvalidDate(format!("'{text}' is not a valid HTTP date")))
}

/// Parse whatever credentials the request carries.
pub fn parse_credentials(
    method: &Method,
    path_and_query: &str,
    headers: &HeaderMap,
    query: &[(String, String)],
    presigned: bool,
) -> Result<Option<PresentedCredentials>, GatewayError> {
    let authorization = headers.get(axum::http::header::AUTHORIZATION);
    if presigned {
        if authorization.is_some() {
            return Err(GatewayError::InvalidAuthorizationHeader(
                "presigned URLs cannot also carry an Authorization header".into(),
            ));
        }
        let path = path_and_query.split('?').next().unwrap_or(path_and_query);
        return parse_presigned(method, path, headers, query)
            .map(|c| Some(PresentedCredentials::Signed(c)));
    }
    if let Some(value) = authorization {
        let text = value.to_str().map_err(|_| {
            GatewayError::InvalidAuthorizationHeader("authorization header is not text".into())
        })?;
        return parse_authorization(text, method, path_and_query, headers).map(Some);
    }
    Ok(None)
}

/// Parse an `Authorization` header value.
pub fn parse_authorization(
    value: &str,
    method: &Method,
    path_and_query: &str,
    headers: &HeaderMap,
) -> Result<PresentedCredentials, GatewayError> {
    let invalid = |reason: &str| GatewayError::InvalidAuthorizationHeader(reason.to_string());
    let (scheme, rest) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| invalid("authorization header has no scheme"))?;

    if scheme.eq_ignore_ascii_case("token") {
        let token = rest.trim();
        if token.is_empty() {
            return Err(invalid("token is empty"));
        }
        return Ok(PresentedCredentials::Token(token.to_string()));
    }
    if !scheme.eq_ignore_ascii_case("signature") {
        return Err(invalid("unsupported authorization scheme"));
    }

    let params = signature_params(rest).ok_or_else(|| invalid("malformed signature parameters"))?;
    let get = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| invalid(&format!("signature is missing {name}")))
    };
    let key_id = get("keyId")?;
    let algorithm = get("algorithm")?;
    let signature = get("signature")?;
    let signed_headers = params
        .iter()
        .find(|(k, _)| k == "headers")
        .map_or(DEFAULT_SIGNED_HEADERS, |(_, v)| v.as_str());

    let mut lines = Vec::new();
    for name in signed_headers.split_whitespace() {
        let name = name.to_ascii_lowercase();
        if name == "(request-target)" {
            lines.push(format!(
                "(request-target): {} {}",
                method.as_str().to_ascii_lowercase(),
                path_and_query
            ));
            continue;
        }
        let value = headers
            .get(name.as_str())
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| invalid(&format!("signed header {name} is missing")))?;
        lines.push(format!("{name}: {}", value.trim()));
    }

    Ok(PresentedCredentials::Signed(Credentials::Signature {
        key_id,
        algorithm,
        signature,
        signing_string: lines.join("\n"),
    }))
}

/// `key="value",key2=value2` pairs. Quoted values may contain commas.
fn signature_params(input: &str) -> Option<Vec<(String, String)>> {
    let mut params = Vec::new();
    let mut rest = input.trim();
    while !rest.is_empty() {
        let (key, after) = rest.split_once('=')?;
        let key = key.trim().to_string();
        let after = after.trim_start();
        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            let end = quoted.find('"')?;
            (&quoted[..end], &quoted[end + 1..])
        } else {
            match after.find(',') {
                Some(end) => (&after[..end], &after[end..]),
                None => (after, ""),
            }
        };
        if key.is_empty() {
            return None;
        }
        params.push((key, value.to_string()));
        rest = remaining.trim_start();
        rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }
    Some(params)
}

/// Parameters of a presigned URL.
pub fn parse_presigned(
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    query: &[(String, String)],
) -> Result<Credentials, GatewayError> {
    let invalid = |reason: String| GatewayError::InvalidAuthorizationHeader(reason);
    let get = |name: &str| {
        query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| invalid(format!("presigned URL is missing {name}")))
    };
    let key_id = get("keyId")?;
    let algorithm = get("algorithm")?;
    let signature = get("signature")?;
    let expires_text = get("expires")?;
    let expires = expires_text
        .parse::<u64>()
        .map_err(|_| invalid(format!("expires '{expires_text}' is not a timestamp")))?;

    let mut signed: Vec<&(String, String)> =
        query.iter().filter(|(k, _)| k != "signature").collect();
    signed.sort();
    let canonical = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(signed.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    Ok(Credentials::Presigned {
        key_id,
        algorithm,
        signature,
        expires,
        signing_string: format!("{}\n{}\n{}\n{}", method.as_str(), host, path, canonical),
    })
}
