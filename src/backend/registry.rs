//! The six connection handles, owned in one place and passed by construction.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::backend::client::{
    AuthCache, BackendClient, BackendConnector, JobExecution, KeyDirectory, MetadataIndex,
    Placement, Streaming,
};
use crate::backend::handle::ConnectionHandle;
use crate::backend::kind::{BackendKind, BackendSet};
use crate::backend::supervisor::{BackendSupervisor, SupervisorState, SupervisorStatus};
use crate::health::readiness::Readiness;
use crate::lifecycle::Shutdown;
use crate::resilience::retries::RetryPolicy;

/// One connector per backend kind.
#[derive(Clone)]
pub struct BackendConnectors {
    pub placement: Arc<dyn BackendConnector<dyn Placement>>,
    pub metadata_index: Arc<dyn BackendConnector<dyn MetadataIndex>>,
    pub auth_cache: Arc<dyn BackendConnector<dyn AuthCache>>,
    pub job_execution: Arc<dyn BackendConnector<dyn JobExecution>>,
    pub streaming: Arc<dyn BackendConnector<dyn Streaming>>,
    pub key_directory: Arc<dyn BackendConnector<dyn KeyDirectory>>,
}

/// Process-wide backend connection state.
pub struct BackendRegistry {
    pub placement: Arc<ConnectionHandle<dyn Placement>>,
    pub metadata_index: Arc<ConnectionHandle<dyn MetadataIndex>>,
    pub auth_cache: Arc<ConnectionHandle<dyn AuthCache>>,
    pub job_execution: Arc<ConnectionHandle<dyn JobExecution>>,
    pub streaming: Arc<ConnectionHandle<dyn Streaming>>,
    pub key_directory: Arc<ConnectionHandle<dyn KeyDirectory>>,
    statuses: [Arc<SupervisorStatus>; 6],
}

impl BackendRegistry {
    /// Create a registry with every handle empty.
    pub fn new() -> Self {
        Self {
            placement: Arc::new(ConnectionHandle::new(BackendKind::Placement)),
            metadata_index: Arc::new(ConnectionHandle::new(BackendKind::MetadataIndex)),
            auth_cache: Arc::new(ConnectionHandle::new(BackendKind::AuthCache)),
            job_execution: Arc::new(ConnectionHandle::new(BackendKind::JobExecution)),
            streaming: Arc::new(ConnectionHandle::new(BackendKind::Streaming)),
            key_directory: Arc::new(ConnectionHandle::new(BackendKind::KeyDirectory)),
            statuses: Default::default(),
        }
    }

    /// Generation of the client currently (or last) installed for `kind`.
    pub fn generation(&self, kind: BackendKind) -> u64 {
        match kind {
            BackendKind::Placement => self.placement.generation(),
            BackendKind::MetadataIndex => self.metadata_index.generation(),
            BackendKind::AuthCache => self.auth_cache.generation(),
            BackendKind::JobExecution => self.job_execution.generation(),
            BackendKind::Streaming => self.streaming.generation(),
            BackendKind::KeyDirectory => self.key_directory.generation(),
        }
    }

    pub fn status(&self, kind: BackendKind) -> &Arc<SupervisorStatus> {
        &self.statuses[kind as usize]
    }

    pub fn state(&self, kind: BackendKind) -> SupervisorState {
        self.status(kind).state()
    }

    /// Kinds that currently have a live client.
    pub fn ready_set(&self) -> BackendSet {
        BackendKind::ALL
            .into_iter()
            .filter(|k| self.is_ready(*k))
            .fold(BackendSet::empty(), BackendSet::with)
    }

    /// Start one supervisor per kind. They run until `shutdown` triggers.
    pub fn spawn_supervisors(
        &self,
        connectors: BackendConnectors,
        retry_delay: Duration,
        shutdown: &Shutdown,
    ) -> Vec<JoinHandle<()>> {
        vec![
            self.spawn_one(&self.placement, connectors.placement, retry_delay, shutdown),
            self.spawn_one(&self.metadata_index, connectors.metadata_index, retry_delay, shutdown),
            self.spawn_one(&self.auth_cache, connectors.auth_cache, retry_delay, shutdown),
            self.spawn_one(&self.job_execution, connectors.job_execution, retry_delay, shutdown),
            self.spawn_one(&self.streaming, connectors.streaming, retry_delay, shutdown),
            self.spawn_one(&self.key_directory, connectors.key_directory, retry_delay, shutdown),
        ]
    }

    fn spawn_one<C>(
        &self,
        handle: &Arc<ConnectionHandle<C>>,
        connector: Arc<dyn BackendConnector<C>>,
        retry_delay: Duration,
        shutdown: &Shutdown,
    ) -> JoinHandle<()>
    where
        C: ?Sized + BackendClient + 'static,
    {
        let kind = handle.kind();
        let policy = RetryPolicy::for_kind(kind, retry_delay);
        BackendSupervisor::new(
            Arc::clone(handle),
            connector,
            policy,
            Arc::clone(self.status(kind)),
        )
        .start(shutdown.subscribe())
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness for BackendRegistry {
    fn is_ready(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Placement => self.placement.is_ready(),
            BackendKind::MetadataIndex => self.metadata_index.is_ready(),
            BackendKind::AuthCache => self.auth_cache.is_ready(),
            BackendKind::JobExecution => self.job_execution.is_ready(),
            BackendKind::Streaming => self.streaming.is_ready(),
            BackendKind::KeyDirectory => self.key_directory.is_ready(),
        }
    }
}
