//! Snapshot coordinates shared by all tasklets of one job.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

/// Epoch number of a distributed snapshot. The first snapshot of a job has
/// id 0 and ids increase by one per snapshot.
pub type SnapshotId = i64;

/// The state-consistency level a job's snapshots provide.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ProcessingGuarantee {
    /// No snapshots are taken; state is lost on failure.
    None,
    /// Snapshots are taken without barrier alignment; items arriving after a
    /// barrier may be reflected in the snapshot and replayed on restore.
    AtLeastOnce,
    /// Snapshots are aligned on every input edge; each item is reflected in
    /// exactly one snapshot epoch.
    ExactlyOnce,
}

/// Snapshot state shared by the tasklets of one job.
///
/// The snapshot coordinator writes, tasklets only read. Fields are atomics so
/// readers on other worker threads observe fully published values.
#[derive(Debug)]
pub struct SnapshotContext {
    guarantee: ProcessingGuarantee,
    current_snapshot_id: AtomicI64,
    completed_snapshot_id: AtomicI64,
}

impl SnapshotContext {
    /// Creates the context for a job with the given guarantee. No snapshot is
    /// in flight and none has completed.
    pub fn new(guarantee: ProcessingGuarantee) -> Self {
        SnapshotContext {
            guarantee,
            current_snapshot_id: AtomicI64::new(0),
            completed_snapshot_id: AtomicI64::new(-1),
        }
    }

    /// The guarantee the job was submitted with. Immutable for the job's
    /// lifetime.
    pub fn guarantee(&self) -> ProcessingGuarantee {
        self.guarantee
    }

    /// Id of the snapshot currently in flight (or the next one to start).
    pub fn current_snapshot_id(&self) -> SnapshotId {
        self.current_snapshot_id.load(Ordering::Acquire)
    }

    /// Id of the latest snapshot known to have completed job-wide, or -1.
    pub fn completed_snapshot_id(&self) -> SnapshotId {
        self.completed_snapshot_id.load(Ordering::Acquire)
    }

    /// Publishes the start of a snapshot. Coordinator-side only.
    pub fn start_snapshot(&self, id: SnapshotId) {
        self.current_snapshot_id.store(id, Ordering::Release);
    }

    /// Publishes the job-wide completion of a snapshot. Coordinator-side only.
    pub fn complete_snapshot(&self, id: SnapshotId) {
        self.completed_snapshot_id.store(id, Ordering::Release);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_publish_in_order() {
        let context = SnapshotContext::new(ProcessingGuarantee::ExactlyOnce);
        assert_eq!(context.current_snapshot_id(), 0);
        assert_eq!(context.completed_snapshot_id(), -1);

        context.start_snapshot(0);
        context.complete_snapshot(0);
        context.start_snapshot(1);
        assert_eq!(context.current_snapshot_id(), 1);
        assert_eq!(context.completed_snapshot_id(), 0);
    }
}
