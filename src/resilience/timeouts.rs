//! Connect deadlines.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A timed-out attempt is an ordinary connect failure for the supervisor

use std::future::Future;
use std::time::Duration;

use crate::backend::client::ConnectError;

/// Bound a connect future by `timeout`.
pub async fn with_connect_timeout<T, F>(
    target: &str,
    timeout: Duration,
    connect: F,
) -> Result<T, ConnectError>
where
    F: Future<Output = Result<T, ConnectError>>,
{
    match tokio::time::timeout(timeout, connect).await {
        Ok(result) => result,
        Err(_) => Err(ConnectError::Timeout {
            target: target.to_string(),
            timeout,
        }),
    }
}
