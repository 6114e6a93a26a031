//! Resource metadata lookup and authorization.
//!
//! # Responsibilities
//! - Fetch the target entry's metadata for routes that declare it
//! - Evaluate the route's auth action against the principal
//!
//! # Design Decisions
//! - Operators pass every check
//! - Account owners may perform any action on their own account
//! - Sub-users additionally need the action among their capabilities
//! - Anonymous routes admit anonymous callers and callers of other accounts

use tracing::warn;

use crate::backend::client::{EntryMetadata, MetadataIndex};
use crate::backend::{BackendKind, ConnectionHandle};
use crate::http::error::GatewayError;
use crate::routing::RouteSpec;
use crate::security::principal::Principal;

/// Look up the entry at `key`. A missing entry is `Ok(None)`.
pub async fn load_metadata(
    index: &ConnectionHandle<dyn MetadataIndex>,
    key: &str,
) -> Result<Option<EntryMetadata>, GatewayError> {
    let client = index
        .current()
        .ok_or(GatewayError::ServiceUnavailable(BackendKind::MetadataIndex))?;
    client.entry(key).await.map_err(|e| {
        warn!(backend = %BackendKind::MetadataIndex, key, error = %e, "metadata lookup failed");
        GatewayError::ServiceUnavailable(BackendKind::MetadataIndex)
    })
}

/// Decide whether `principal` may run `route` against `account`.
pub fn authorize(
    route: &RouteSpec,
    principal: Option<&Principal>,
    account: Option<&str>,
    metadata: Option<&EntryMetadata>,
    resource: &str,
) -> Result<(), GatewayError> {
    let Some(principal) = principal else {
        return if route.anonymous {
            Ok(())
        } else {
            Err(GatewayError::AuthorizationRequired(resource.to_string()))
        };
    };
    if principal.operator {
        return Ok(());
    }

    if let Some(account) = account {
        if principal.account != account {
            if route.anonymous {
                return Ok(());
            }
            return Err(GatewayError::AccountMismatch {
                caller: principal.caller(),
                account: account.to_string(),
            });
        }
    }

    if !principal.is_sub_user() {
        return Ok(());
    }
    match route.auth_action.resolve(metadata.map(|m| m.entry_type)) {
        Some(action) if !principal.can(action) => Err(GatewayError::AuthorizationFailed {
            caller: principal.caller(),
            action: action.to_string(),
            resource: resource.to_string(),
        }),
        _ => Ok(()),
    }
}
