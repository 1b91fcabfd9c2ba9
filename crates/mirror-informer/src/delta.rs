//! Delta types.
//!
//! A delta is one state transition of one object as reported by the delta
//! source. Batches carry the transitions for (typically) a single object,
//! oldest first.

use std::fmt;

use mirror_core::BoxObject;

/// The kind of state transition a delta describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeltaKind {
    /// The object appeared.
    Added,
    /// The object changed.
    Updated,
    /// The object disappeared. The carried object may be a
    /// [`Tombstone`](mirror_core::Tombstone).
    Deleted,
    /// Synthetic replay of current state, produced by a resync. Applied like
    /// an add/update but fanned out only to listeners due for resync.
    Sync,
}

impl fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            DeltaKind::Added => "added",
            DeltaKind::Updated => "updated",
            DeltaKind::Deleted => "deleted",
            DeltaKind::Sync => "sync",
        };
        write!(f, "{kind}")
    }
}

/// A single (kind, object) state transition.
#[derive(Clone, Debug)]
pub struct Delta {
    /// The transition kind.
    pub kind: DeltaKind,
    /// The object after the transition (for `Deleted`, the last known
    /// state, possibly wrapped in a tombstone).
    pub object: BoxObject,
}

impl Delta {
    /// Create a new delta.
    #[must_use]
    pub fn new(kind: DeltaKind, object: BoxObject) -> Self {
        Self { kind, object }
    }
}

/// An ordered batch of deltas, oldest first.
pub type Deltas = Vec<Delta>;
