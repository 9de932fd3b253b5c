//! The failure taxonomy of the execution core.

use thiserror::Error;

/// An error escaping user-supplied processor code.
pub type ProcessorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal failures of one tasklet, surfaced to the job coordinator.
///
/// Outbox refusal is deliberately absent: a refused offer is reported as
/// `NoProgress` and retried on a later scheduling slice.
#[derive(Debug, Error)]
pub enum TaskletError {
    /// A snapshot barrier arrived carrying an id other than the one in
    /// flight. The snapshot protocol admits no recovery from this.
    #[error("unexpected snapshot id {received} on ordinal {ordinal}, expected {expected}")]
    UnexpectedSnapshotId {
        /// Input ordinal the barrier arrived on.
        ordinal: usize,
        /// The id the tasklet was aligning.
        expected: i64,
        /// The id the barrier carried.
        received: i64,
    },

    /// User code failed during `Processor::init`; the job is aborted before
    /// any item is processed.
    #[error("processor of vertex '{vertex}' failed to initialize")]
    ProcessorInitFailure {
        /// Name of the vertex the processor belongs to.
        vertex: String,
        /// The user error.
        #[source]
        source: ProcessorError,
    },

    /// User code failed while processing, completing, or snapshotting.
    ///
    /// The tasklet never constructs this: user failures unwind through
    /// `call()` to the worker, which records them against the job under this
    /// variant.
    #[error("processor of vertex '{vertex}' failed during execution")]
    ProcessorExecutionFailure {
        /// Name of the vertex the processor belongs to.
        vertex: String,
        /// The user error.
        #[source]
        source: ProcessorError,
    },

    /// The job-cancel signal was observed at a state-machine boundary.
    #[error("job cancelled")]
    Cancelled,
}
