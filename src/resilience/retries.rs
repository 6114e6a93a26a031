//! Reconnect retry policy.
//!
//! # Design Decisions
//! - Backends whose absence breaks most of the service retry immediately
//! - Replicated, load-balanced backends wait a fixed delay to avoid a
//!   reconnect storm against the fleet
//! - No backoff ceiling and no attempt cap

use std::time::Duration;

use crate::backend::BackendKind;

/// Default delay for fixed-delay backends.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How a supervisor waits before its next connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry within the same scheduling turn.
    Immediate,
    /// Retry after a fixed delay.
    FixedDelay(Duration),
}

impl RetryPolicy {
    /// The policy table.
    pub fn for_kind(kind: BackendKind, fixed_delay: Duration) -> Self {
        match kind {
            BackendKind::MetadataIndex | BackendKind::JobExecution | BackendKind::KeyDirectory => {
                RetryPolicy::Immediate
            }
            BackendKind::Placement | BackendKind::AuthCache | BackendKind::Streaming => {
                RetryPolicy::FixedDelay(fixed_delay)
            }
        }
    }

    pub fn delay(&self) -> Duration {
        match self {
            RetryPolicy::Immediate => Duration::ZERO,
            RetryPolicy::FixedDelay(d) => *d,
        }
    }

    /// Wait out the policy. Immediate retries still yield once so a backend
    /// that fails synchronously cannot starve the other supervisors.
    pub async fn wait(&self) {
        match self {
            RetryPolicy::Immediate => tokio::task::yield_now().await,
            RetryPolicy::FixedDelay(d) => tokio::time::sleep(*d).await,
        }
    }
}
