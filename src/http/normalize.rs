//! Request normalization ahead of routing.
//!
//! # Responsibilities
//! - Canonicalize the request path (strict percent-escapes, UTF-8, slashes)
//! - Resolve bare content-type tokens (`json`) to media types
//! - Rewrite job-collection polls to the live jobs route
//!
//! # Design Decisions
//! - Canonicalization rule: every `%` must be followed by two hex digits,
//!   the decoded bytes must be UTF-8, runs of `/` collapse to one and a
//!   trailing `/` is dropped except on the root
//! - The live rewrite looks at query *keys* only, compared case-insensitively

use percent_encoding::percent_decode_str;

use crate::http::error::GatewayError;
use crate::routing::matcher::{PathPattern, PatternError};

/// Query keys that turn a job-collection GET into a live-jobs poll.
pub const LIVE_QUERY_KEYS: [&str; 3] = ["state", "status", "name"];

/// Canonicalize a raw request path.
pub fn sanitize_path(raw: &str) -> Result<String, GatewayError> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
            if !valid {
                return Err(GatewayError::InvalidPath(format!("{raw} has a malformed escape")));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| GatewayError::InvalidPath(format!("{raw} is not valid UTF-8")))?;

    let mut path = String::with_capacity(decoded.len() + 1);
    for segment in decoded.split('/').filter(|s| !s.is_empty()) {
        path.push('/');
        path.push_str(segment);
    }
    if path.is_empty() {
        path.push('/');
    }
    Ok(path)
}

/// Resolve a content type without `/` as a file-extension token.
/// Unknown tokens are returned unchanged.
pub fn normalize_content_type(content_type: &str) -> String {
    if content_type.contains('/') {
        return content_type.to_string();
    }
    mime_guess::from_ext(content_type.trim())
        .first()
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| content_type.to_string())
}

/// Decoded query pairs. Valueless keys map to "".
pub fn parse_query(query: Option<&str>) -> Vec<(String, String)> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

/// Maps `GET /:account/jobs?state=…` style polls onto `/:account/jobs/live`.
#[derive(Debug, Clone)]
pub struct LiveJobsRewrite {
    collection: PathPattern,
}

impl LiveJobsRewrite {
    pub fn new() -> Result<Self, PatternError> {
        Ok(Self {
            collection: PathPattern::parse("/:account/jobs")?,
        })
    }

    /// The rewritten dispatch path, if the rewrite applies.
    pub fn rewrite(&self, path: &str, query: &[(String, String)]) -> Option<String> {
        let trimmed = match path.strip_suffix('/') {
            Some(p) if !p.is_empty() => p,
            _ => path,
        };
        let params = self.collection.captures(trimmed)?;
        let polled = query
            .iter()
            .any(|(key, _)| LIVE_QUERY_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k)));
        polled.then(|| format!("/{}/jobs/live", params["account"]))
    }
}
