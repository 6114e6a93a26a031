//! Authentication against the auth cache and key directory.
//!
//! # Responsibilities
//! - Check expiry of presigned URLs and clock skew of signed requests
//! - Resolve a `Principal` through the backend that owns the credential type
//! - Let anonymous routes through without credentials
//!
//! # Design Decisions
//! - The client is read from its handle at call time; an emptied handle
//!   yields 503 even though readiness passed a moment earlier
//! - A backend refusal is a client error (401); a failed call is a 503

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::backend::client::{AuthCache, BackendCallError, KeyDirectory};
use crate::backend::{BackendKind, ConnectionHandle};
use crate::http::error::GatewayError;
use crate::http::request::RequestContext;
use crate::security::credentials::{Credentials, PresentedCredentials};
use crate::security::principal::Principal;

pub struct Authenticator {
    auth_cache: Arc<ConnectionHandle<dyn AuthCache>>,
    key_directory: Arc<ConnectionHandle<dyn KeyDirectory>>,
    max_request_age: Duration,
}

impl Authenticator {
    pub fn new(
        auth_cache: Arc<ConnectionHandle<dyn AuthCache>>,
        key_directory: Arc<ConnectionHandle<dyn KeyDirectory>>,
        max_request_age: Duration,
    ) -> Self {
        Self {
            auth_cache,
            key_directory,
            max_request_age,
        }
    }

    /// `Ok(None)` means an anonymous caller on an anonymous route.
    pub async fn authenticate(
        &self,
        ctx: &RequestContext,
        now: SystemTime,
    ) -> Result<Option<Principal>, GatewayError> {
        let anonymous = ctx.route.as_ref().is_some_and(|r| r.anonymous);
        let Some(presented) = &ctx.credentials else {
            return if anonymous {
                Ok(None)
            } else {
                Err(GatewayError::AuthorizationRequired(ctx.path.clone()))
            };
        };

        match presented {
            PresentedCredentials::Signed(credentials) => {
                self.check_freshness(credentials, ctx.date, now)?;
                self.verify_signature(credentials).await.map(Some)
            }
            PresentedCredentials::Token(token) => self.resolve_token(token).await.map(Some),
        }
    }

    fn check_freshness(
        &self,
        credentials: &Credentials,
        date: Option<SystemTime>,
        now: SystemTime,
    ) -> Result<(), GatewayError> {
        match credentials {
            Credentials::Presigned { expires, .. } => {
                let now_secs = now.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
                if *expires < now_secs {
                    return Err(GatewayError::InvalidSignature(
                        "presigned URL has expired".to_string(),
                    ));
                }
                Ok(())
            }
            Credentials::Signature { .. } => {
                let date = date.ok_or_else(|| {
                    GatewayError::RequestExpired("signed requests must carry a date".to_string())
                })?;
                let skew = now.duration_since(date).unwrap_or_else(|e| e.duration());
                if skew > self.max_request_age {
                    return Err(GatewayError::RequestExpired(format!(
                        "request date is more than {}s from server time",
                        self.max_request_age.as_secs()
                    )));
                }
                Ok(())
            }
        }
    }

    async fn verify_signature(&self, credentials: &Credentials) -> Result<Principal, GatewayError> {
        let client = self
            .auth_cache
            .current()
            .ok_or(GatewayError::ServiceUnavailable(BackendKind::AuthCache))?;
        client
            .authenticate(credentials)
            .await
            .map_err(|e| call_error(BackendKind::AuthCache, e))
    }

    async fn resolve_token(&self, token: &str) -> Result<Principal, GatewayError> {
        let client = self
            .key_directory
            .current()
            .ok_or(GatewayError::ServiceUnavailable(BackendKind::KeyDirectory))?;
        client
            .resolve_token(token)
            .await
            .map_err(|e| call_error(BackendKind::KeyDirectory, e))?
            .ok_or_else(|| GatewayError::InvalidSignature("token is not valid".to_string()))
    }
}

fn call_error(kind: BackendKind, error: BackendCallError) -> GatewayError {
    match error {
        BackendCallError::Rejected(reason) => {
            debug!(backend = %kind, %reason, "credentials rejected");
            GatewayError::InvalidSignature("the signature could not be verified".to_string())
        }
        BackendCallError::Failed(reason) => {
            warn!(backend = %kind, %reason, "authentication call failed");
            GatewayError::ServiceUnavailable(kind)
        }
    }
}
