//! Backend kinds and small sets of them.
//!
//! # Design Decisions
//! - Closed enum: the gateway depends on exactly six subsystems
//! - Declaration order is the order readiness reports the first unready kind
//! - `BackendSet` is a bitset so route specs stay `Copy` and cheap to check

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the external subsystems the gateway depends on.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Storage-node placement (picks nodes for object writes).
    Placement = 0,
    /// Metadata index for directories, objects and links.
    MetadataIndex = 1,
    /// Account, key and role cache used for authentication.
    AuthCache = 2,
    /// Compute-job execution.
    JobExecution = 3,
    /// Interactive terminal streaming.
    Streaming = 4,
    /// Token and key lookup used by login.
    KeyDirectory = 5,
}

impl BackendKind {
    /// Every kind, in declaration order.
    pub const ALL: [BackendKind; 6] = [
        BackendKind::Placement,
        BackendKind::MetadataIndex,
        BackendKind::AuthCache,
        BackendKind::JobExecution,
        BackendKind::Streaming,
        BackendKind::KeyDirectory,
    ];

    /// Stable lowercase name used in logs, metrics and config keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Placement => "placement",
            BackendKind::MetadataIndex => "metadata_index",
            BackendKind::AuthCache => "auth_cache",
            BackendKind::JobExecution => "job_execution",
            BackendKind::Streaming => "streaming",
            BackendKind::KeyDirectory => "key_directory",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of backend kinds, iterated in declaration order.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendSet(u8);

impl BackendSet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build a set from a slice of kinds.
    pub fn of(kinds: &[BackendKind]) -> Self {
        kinds.iter().fold(Self::empty(), |set, kind| set.with(*kind))
    }

    /// Return a copy of this set that also contains `kind`.
    pub fn with(self, kind: BackendKind) -> Self {
        Self(self.0 | kind.bit())
    }

    pub fn contains(&self, kind: BackendKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate members in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = BackendKind> + '_ {
        BackendKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
