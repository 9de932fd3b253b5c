//! The user-implemented operator driven by a tasklet, and the supplier
//! hierarchy that deploys it across a cluster.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::channels::inbox::Inbox;
use crate::channels::outbox::Outbox;
use crate::error::ProcessorError;
use crate::snapshot::SnapshotContext;

/// Address of a cluster member hosting tasklets.
pub type MemberAddress = SocketAddr;

/// Runtime information a processor receives at initialization.
pub struct ProcessorContext {
    vertex_name: String,
    global_index: usize,
    snapshot_context: Arc<SnapshotContext>,
}

impl ProcessorContext {
    /// Creates the context for one processor instance of a vertex.
    pub fn new(
        vertex_name: impl Into<String>,
        global_index: usize,
        snapshot_context: Arc<SnapshotContext>,
    ) -> Self {
        ProcessorContext {
            vertex_name: vertex_name.into(),
            global_index,
            snapshot_context,
        }
    }

    /// Name of the dataflow vertex this processor instantiates.
    pub fn vertex_name(&self) -> &str {
        &self.vertex_name
    }

    /// Job-wide index of this processor instance among its vertex's peers.
    pub fn global_index(&self) -> usize {
        self.global_index
    }

    /// The job's shared snapshot coordinates.
    pub fn snapshot_context(&self) -> &Arc<SnapshotContext> {
        &self.snapshot_context
    }
}

/// A dataflow operator performing the actual transformation.
///
/// The tasklet drives a processor through its lifecycle: `init` once, then
/// interleaved `try_process`/`process` while inputs flow, snapshot methods at
/// barrier alignment points, `complete` once inputs are drained. All methods
/// are cooperative: they must return promptly and tolerate a full outbox by
/// making no progress, to be retried on a later scheduling slice.
///
/// Snapshot methods have defaults that make a stateless processor trivially
/// snapshottable: it contributes no state and completes immediately.
pub trait Processor<D> {
    /// Called once before any other method. Must not emit to the outbox.
    ///
    /// Processors that emit later keep the outbox handle; the default
    /// discards it.
    fn init(&mut self, outbox: Outbox<D>, context: &ProcessorContext) -> Result<(), ProcessorError> {
        let _ = (outbox, context);
        Ok(())
    }

    /// Performs work not driven by any inbox. Returns `true` when there is
    /// nothing further to do in this invocation.
    fn try_process(&mut self) -> bool {
        true
    }

    /// Consumes zero or more items from `inbox`, emitting to the outbox as
    /// its capacity allows. `ordinal` identifies the input edge the items
    /// came from.
    fn process(&mut self, ordinal: usize, inbox: &mut Inbox<D>);

    /// Called after all inputs are drained, repeatedly until it returns
    /// `true`. May emit.
    fn complete(&mut self) -> bool {
        true
    }

    /// Whether this processor honors the cooperative calling convention.
    /// Non-cooperative processors are scheduled on dedicated threads and get
    /// unbounded outboxes.
    fn is_cooperative(&self) -> bool {
        true
    }

    /// Emits this processor's snapshot state to the snapshot sink. Returns
    /// `true` once all state for the current snapshot has been emitted.
    fn save_snapshot(&mut self) -> bool {
        true
    }

    /// Consumes restored snapshot entries from `inbox`.
    ///
    /// Only invoked on processors that saved state; the default treats any
    /// restore data as a deployment error.
    fn restore_snapshot(&mut self, inbox: &mut Inbox<D>) {
        let _ = inbox;
        panic!("processor received snapshot data but does not restore state");
    }

    /// Called once after all restore entries have been consumed.
    fn finish_snapshot_restore(&mut self) {}
}

/// Creates the processor instances hosted on one cluster member.
pub trait ProcessorSupplier<D> {
    /// Returns `count` fresh processor instances.
    fn take(&mut self, count: usize) -> Vec<Box<dyn Processor<D>>>;
}

impl<D, F> ProcessorSupplier<D> for F
where
    F: FnMut() -> Box<dyn Processor<D>>,
{
    fn take(&mut self, count: usize) -> Vec<Box<dyn Processor<D>>> {
        (0..count).map(|_| self()).collect()
    }
}

/// Job-level information handed to a [`ProcessorMetaSupplier`] when the job
/// is planned.
pub struct MetaSupplierContext {
    local_address: MemberAddress,
    member_count: usize,
    local_parallelism: usize,
}

impl MetaSupplierContext {
    /// Creates the planning context.
    pub fn new(local_address: MemberAddress, member_count: usize, local_parallelism: usize) -> Self {
        MetaSupplierContext {
            local_address,
            member_count,
            local_parallelism,
        }
    }

    /// Address of the member the job was submitted on.
    pub fn local_address(&self) -> MemberAddress {
        self.local_address
    }

    /// Number of members participating in the job.
    pub fn member_count(&self) -> usize {
        self.member_count
    }

    /// Number of parallel processors of this vertex per member.
    pub fn local_parallelism(&self) -> usize {
        self.local_parallelism
    }
}

/// The cluster-wide processor factory for one vertex.
///
/// Initialized once when the job is planned, then asked to map each member
/// address to the [`ProcessorSupplier`] deployed there.
pub trait ProcessorMetaSupplier<D> {
    /// Called once with the planning context before `get`.
    fn init(&mut self, context: &MetaSupplierContext) {
        let _ = context;
    }

    /// Maps each of `addresses` to the supplier deployed on that member.
    fn get(
        &mut self,
        addresses: &[MemberAddress],
    ) -> Box<dyn FnMut(MemberAddress) -> Box<dyn ProcessorSupplier<D>>>;
}
