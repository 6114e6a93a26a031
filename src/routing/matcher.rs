//! Route matching logic.
//!
//! # Responsibilities
//! - Compile path patterns (`:param`, trailing `*rest`) into anchored regexes
//! - Extract named parameters from a matching path
//! - Match a request's content type against a route's declared type
//!
//! # Design Decisions
//! - Patterns compiled once at startup, immutable at runtime
//! - Path matching is case-sensitive; media types are not
//! - A route declaring no content type accepts any (including none)

use std::collections::HashMap;
use std::fmt;

use mime_guess::mime::Mime;
use regex::Regex;

/// Account names: a letter followed by at least one more allowed character.
pub const ACCOUNT_PATTERN: &str = r"[a-zA-Z][a-zA-Z0-9_.@%]+";

/// Error raised for a malformed pattern. Only reachable from route registration.
#[derive(Debug, thiserror::Error)]
#[error("invalid route pattern '{pattern}': {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

/// A compiled path pattern.
///
/// Syntax: literal segments, `:name` for one segment (`:account` is restricted
/// to account names) and a final `*name` matching the rest of the path,
/// possibly empty.
#[derive(Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    names: Vec<String>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let invalid = |reason: &str| PatternError {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };
        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut expr = String::from("^");
        let mut names = Vec::new();
        let segments: Vec<&str> = pattern[1..].split('/').collect();
        for (i, segment) in segments.iter().enumerate() {
            if let Some(name) = segment.strip_prefix('*') {
                if i + 1 != segments.len() {
                    return Err(invalid("'*' must be the last segment"));
                }
                expr.push_str(&format!("(?:/(?P<{name}>.*))?"));
                names.push(name.to_string());
            } else if let Some(name) = segment.strip_prefix(':') {
                let class = if name == "account" { ACCOUNT_PATTERN } else { "[^/]+" };
                expr.push_str(&format!("/(?P<{name}>{class})"));
                names.push(name.to_string());
            } else if !segment.is_empty() {
                expr.push('/');
                expr.push_str(&regex::escape(segment));
            } else if segments.len() > 1 {
                return Err(invalid("empty segment"));
            } else {
                expr.push('/');
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
            names,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Named parameters if `path` matches. An absent `*rest` yields "".
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.names
                .iter()
                .map(|name| {
                    let value = caps.name(name).map(|m| m.as_str()).unwrap_or_default();
                    (name.clone(), value.to_string())
                })
                .collect(),
        )
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.source).finish()
    }
}

/// Which request content types a route accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentTypeMatch {
    Any,
    /// Media type essence plus, optionally, the value of its `type` parameter
    /// (`application/json; type=directory`).
    Exact {
        essence: String,
        type_param: Option<String>,
    },
}

impl ContentTypeMatch {
    pub fn exact(essence: &str, type_param: Option<&str>) -> Self {
        Self::Exact {
            essence: essence.to_ascii_lowercase(),
            type_param: type_param.map(str::to_ascii_lowercase),
        }
    }

    pub fn matches(&self, content_type: Option<&str>) -> bool {
        let (expected, expected_param) = match self {
            Self::Any => return true,
            Self::Exact {
                essence,
                type_param,
            } => (essence, type_param),
        };
        let Some(mime) = content_type.and_then(|ct| ct.parse::<Mime>().ok()) else {
            return false;
        };
        if !mime.essence_str().eq_ignore_ascii_case(expected) {
            return false;
        }
        match expected_param {
            None => true,
            Some(want) => mime
                .get_param("type")
                .map(|v| v.as_str().eq_ignore_ascii_case(want))
                .unwrap_or(false),
        }
    }
}
