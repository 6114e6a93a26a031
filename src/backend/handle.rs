//! Generation-tagged connection slot for one backend kind.
//!
//! # Responsibilities
//! - Expose the current client (or none) to any request, lock-free
//! - Keep `(client, generation)` as one unit so readers never see a mix
//! - Discard successes from superseded connect attempts
//! - Ignore clears coming from a client that was already replaced
//!
//! # Design Decisions
//! - Readers use `ArcSwap::load`, never a lock
//! - Writers are serialized by a small mutex that also owns the attempt counter

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::backend::kind::BackendKind;

/// Identifies one connect attempt. Only the most recent ticket may install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptTicket(u64);

impl AttemptTicket {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

struct Slot<C: ?Sized> {
    client: Option<Arc<C>>,
    generation: u64,
}

/// The visible slot holding the live client for one backend kind.
pub struct ConnectionHandle<C: ?Sized> {
    kind: BackendKind,
    slot: ArcSwap<Slot<C>>,
    /// Latest issued attempt ticket.
    latest_attempt: Mutex<u64>,
}

impl<C: ?Sized> ConnectionHandle<C> {
    /// Create an empty handle (no client, generation 0).
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            slot: ArcSwap::from_pointee(Slot {
                client: None,
                generation: 0,
            }),
            latest_attempt: Mutex::new(0),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Current client, if any.
    pub fn current(&self) -> Option<Arc<C>> {
        self.slot.load().client.clone()
    }

    /// Current client together with the generation it was installed under.
    pub fn snapshot(&self) -> (Option<Arc<C>>, u64) {
        let slot = self.slot.load();
        (slot.client.clone(), slot.generation)
    }

    /// True iff a client is currently visible. Pure read.
    pub fn is_ready(&self) -> bool {
        self.slot.load().client.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.slot.load().generation
    }

    /// Start a new connect attempt, superseding every earlier one.
    pub fn begin_attempt(&self) -> AttemptTicket {
        let mut latest = self.latest_attempt.lock().unwrap_or_else(|e| e.into_inner());
        *latest += 1;
        AttemptTicket(*latest)
    }

    /// Install `client` for the attempt `ticket`.
    ///
    /// Returns the new generation, or `None` when the attempt was superseded
    /// and the client was discarded.
    pub fn install(&self, ticket: AttemptTicket, client: Arc<C>) -> Option<u64> {
        let latest = self.latest_attempt.lock().unwrap_or_else(|e| e.into_inner());
        if ticket.0 != *latest {
            tracing::debug!(
                backend = %self.kind,
                attempt = ticket.0,
                latest = *latest,
                "Discarding client from superseded connect attempt"
            );
            return None;
        }

        let generation = self.slot.load().generation + 1;
        self.slot.store(Arc::new(Slot {
            client: Some(client),
            generation,
        }));
        Some(generation)
    }

    /// Remove the client installed under `generation`.
    ///
    /// Returns false (and changes nothing) when a newer client is visible or
    /// the slot is already empty.
    pub fn clear(&self, generation: u64) -> bool {
        let _writer = self.latest_attempt.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.slot.load();
        if current.generation != generation || current.client.is_none() {
            return false;
        }
        self.slot.store(Arc::new(Slot {
            client: None,
            generation,
        }));
        true
    }

    /// Remove whatever client is visible. Used on shutdown.
    pub fn clear_any(&self) {
        let _writer = self.latest_attempt.lock().unwrap_or_else(|e| e.into_inner());
        let generation = self.slot.load().generation;
        self.slot.store(Arc::new(Slot {
            client: None,
            generation,
        }));
    }
}
