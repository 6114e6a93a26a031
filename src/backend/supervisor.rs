//! Connect / fail / reconnect state machine for one backend kind.
//!
//! # States
//! - Connecting: first attempt after start
//! - Connected: a client is installed in the handle
//! - Reconnecting: the last attempt failed or the client went away
//! - Stopped: process shutdown
//!
//! # State Transitions
//! ```text
//! Connecting   → Connected:    connect success
//! Connecting   → Reconnecting: connect failure
//! Connected    → Reconnecting: client reported close or fatal error
//! Reconnecting → Connected:    connect success
//! any          → Stopped:      shutdown signal
//! ```
//!
//! # Design Decisions
//! - The only observer of a client is the `closed()` future awaited for the
//!   generation it was installed under; it is dropped on every transition, so
//!   a replaced client has nothing left to fire into
//! - Clears are generation-scoped as a second line (see `handle.rs`)
//! - Errors never leave this module; requests see them only through readiness

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::backend::client::{BackendClient, BackendConnector, ClientEvent};
use crate::backend::handle::ConnectionHandle;
use crate::backend::kind::BackendKind;
use crate::observability::metrics;
use crate::resilience::retries::RetryPolicy;

/// Supervisor lifecycle state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Connecting = 0,
    Connected = 1,
    Reconnecting = 2,
    Stopped = 3,
}

impl From<u8> for SupervisorState {
    fn from(val: u8) -> Self {
        match val {
            1 => SupervisorState::Connected,
            2 => SupervisorState::Reconnecting,
            3 => SupervisorState::Stopped,
            _ => SupervisorState::Connecting,
        }
    }
}

/// Observable counters of a running supervisor.
#[derive(Debug, Default)]
pub struct SupervisorStatus {
    state: AtomicU8,
    attempts: AtomicU64,
    connects: AtomicU64,
}

impl SupervisorStatus {
    pub fn state(&self) -> SupervisorState {
        SupervisorState::from(self.state.load(Ordering::Acquire))
    }

    /// Connect attempts made so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Successful connects so far.
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    fn set_state(&self, state: SupervisorState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Keeps exactly one live client in a `ConnectionHandle`.
pub struct BackendSupervisor<C: ?Sized> {
    kind: BackendKind,
    handle: Arc<ConnectionHandle<C>>,
    connector: Arc<dyn BackendConnector<C>>,
    policy: RetryPolicy,
    status: Arc<SupervisorStatus>,
}

impl<C> BackendSupervisor<C>
where
    C: ?Sized + BackendClient + 'static,
{
    pub fn new(
        handle: Arc<ConnectionHandle<C>>,
        connector: Arc<dyn BackendConnector<C>>,
        policy: RetryPolicy,
        status: Arc<SupervisorStatus>,
    ) -> Self {
        Self {
            kind: handle.kind(),
            handle,
            connector,
            policy,
            status,
        }
    }

    /// Spawn the state machine. Effects are visible only through the handle.
    pub fn start(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Run until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let kind = self.kind;
        let mut consecutive_failures: u64 = 0;
        self.status.set_state(SupervisorState::Connecting);

        tracing::info!(backend = %kind, policy = ?self.policy, "Backend supervisor starting");

        loop {
            let ticket = self.handle.begin_attempt();
            self.status.attempts.fetch_add(1, Ordering::Relaxed);

            let outcome = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                outcome = self.connector.connect() => outcome,
            };

            match outcome {
                Ok(client) => {
                    let Some(generation) = self.handle.install(ticket, Arc::clone(&client)) else {
                        continue;
                    };
                    consecutive_failures = 0;
                    self.status.connects.fetch_add(1, Ordering::Relaxed);
                    self.status.set_state(SupervisorState::Connected);
                    metrics::record_backend_ready(kind, true);
                    tracing::info!(
                        backend = %kind,
                        generation,
                        remote = %client.describe(),
                        "Backend connected"
                    );

                    let event = tokio::select! {
                        biased;
                        _ = shutdown.recv() => break,
                        event = client.closed() => event,
                    };

                    match &event {
                        ClientEvent::Closed => {
                            tracing::warn!(backend = %kind, generation, "Backend connection closed (reconnecting)");
                        }
                        ClientEvent::Error(reason) => {
                            tracing::warn!(backend = %kind, generation, error = %reason, "Backend error (reconnecting)");
                        }
                    }
                    self.handle.clear(generation);
                    metrics::record_backend_ready(kind, false);
                    metrics::record_reconnect(kind);
                }
                Err(err) => {
                    consecutive_failures += 1;
                    // One error per outage; the rest of the streak is debug noise.
                    if consecutive_failures == 1 {
                        tracing::error!(backend = %kind, error = %err, "Backend connection failed");
                    } else {
                        tracing::debug!(
                            backend = %kind,
                            error = %err,
                            consecutive_failures,
                            "Backend connection still failing"
                        );
                    }
                }
            }

            self.status.set_state(SupervisorState::Reconnecting);
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = self.policy.wait() => {}
            }
        }

        self.handle.clear_any();
        self.status.set_state(SupervisorState::Stopped);
        metrics::record_backend_ready(kind, false);
        tracing::info!(backend = %kind, "Backend supervisor stopped");
    }
}
