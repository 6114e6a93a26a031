//! Contracts of the backend client collaborators.
//!
//! The supervisor only relies on the connect lifecycle (`BackendConnector`,
//! `BackendClient::closed`). Authentication and authorization additionally
//! call the few domain operations declared here; everything else a route
//! handler does with a client is outside the gateway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::security::{Credentials, Principal};

/// Lifecycle event reported by a live client when it stops being usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The remote end closed the connection.
    Closed,
    /// A fatal error; the client must be replaced.
    Error(String),
}

/// Failure to establish a client.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connect to {target} failed: {reason}")]
    Unreachable { target: String, reason: String },
    #[error("connect to {target} timed out after {timeout:?}")]
    Timeout { target: String, timeout: Duration },
}

/// Failure of a domain call on a connected client.
#[derive(Debug, Error)]
pub enum BackendCallError {
    /// The backend answered and refused the request (bad key, bad signature).
    #[error("rejected: {0}")]
    Rejected(String),
    /// The call itself failed.
    #[error("call failed: {0}")]
    Failed(String),
}

/// A connected client for one backend.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Human readable identity for logs (usually the remote address).
    fn describe(&self) -> String;

    /// Resolves once the client reports a fatal error or close.
    ///
    /// Never resolving is valid for a client that stays healthy forever.
    async fn closed(&self) -> ClientEvent;
}

/// Establishes clients of type `C` for one backend kind.
#[async_trait]
pub trait BackendConnector<C: ?Sized>: Send + Sync {
    async fn connect(&self) -> Result<Arc<C>, ConnectError>;
}

/// Type of a metadata entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Directory,
    Object,
    Link,
}

/// Metadata of a directory, object or link as stored in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub key: String,
    pub owner: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(default)]
    pub etag: Option<String>,
}

#[async_trait]
pub trait AuthCache: BackendClient {
    /// Verify signed credentials and return the caller.
    async fn authenticate(&self, credentials: &Credentials) -> Result<Principal, BackendCallError>;
}

#[async_trait]
pub trait MetadataIndex: BackendClient {
    /// Fetch metadata for `key`; `Ok(None)` when no entry exists.
    async fn entry(&self, key: &str) -> Result<Option<EntryMetadata>, BackendCallError>;
}

#[async_trait]
pub trait KeyDirectory: BackendClient {
    /// Resolve an opaque login token to its principal.
    async fn resolve_token(&self, token: &str) -> Result<Option<Principal>, BackendCallError>;
}

/// Placement is lifecycle-only from the gateway's point of view.
pub trait Placement: BackendClient {}

pub trait JobExecution: BackendClient {}

pub trait Streaming: BackendClient {}
