//! The items that travel along dataflow edges.

use serde::{Deserialize, Serialize};

use crate::snapshot::SnapshotId;

/// A monotonically non-decreasing event-time marker.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Watermark {
    timestamp: i64,
}

impl Watermark {
    /// Creates a watermark at the given event time.
    pub fn new(timestamp: i64) -> Self {
        Watermark { timestamp }
    }

    /// The event time this watermark asserts all earlier items are below.
    pub fn timestamp(self) -> i64 {
        self.timestamp
    }
}

/// A control item delimiting snapshot epochs on a dataflow edge.
///
/// Barriers are aligned across input edges for exactly-once processing and
/// broadcast downstream once the local snapshot contribution is saved.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct SnapshotBarrier {
    snapshot_id: SnapshotId,
}

impl SnapshotBarrier {
    /// Creates a barrier for the given snapshot epoch.
    pub fn new(snapshot_id: SnapshotId) -> Self {
        SnapshotBarrier { snapshot_id }
    }

    /// The snapshot epoch this barrier delimits.
    pub fn snapshot_id(self) -> SnapshotId {
        self.snapshot_id
    }
}

/// The atomic unit moved between operators.
///
/// Data elements are routed by the edge's partitioning function; watermarks,
/// barriers, and the done sentinel are control items broadcast to every
/// outbound edge.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum Item<D> {
    /// A data element with an engine-opaque payload.
    Data(D),
    /// An event-time marker.
    Watermark(Watermark),
    /// A snapshot epoch delimiter.
    Barrier(SnapshotBarrier),
    /// Sentinel marking the end of a stream, emitted once when the producing
    /// tasklet reaches its terminal state.
    Done,
}
