//! The cooperative tasklet driving one processor through its lifecycle.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::channels::cursor::{group_by_priority, CircularCursor};
use crate::channels::edge::InboundEdgeStream;
use crate::channels::inbox::Inbox;
use crate::channels::outbox::Outbox;
use crate::error::TaskletError;
use crate::item::{Item, SnapshotBarrier};
use crate::logging::{TaskletEvent, TaskletLogger};
use crate::processor::{Processor, ProcessorContext};
use crate::progress::{ProgressState, ProgressTracker};
use crate::snapshot::{ProcessingGuarantee, SnapshotId};
use crate::Data;

/// Cooperatively observed signal that the owning job was cancelled.
///
/// The coordinator trips it once; every tasklet holding a clone observes it
/// at its next state-machine boundary. There is no preemption.
#[derive(Clone, Debug, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    /// Creates an untripped signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A cooperative unit of execution multiplexed by a worker.
///
/// Workers call `init` once and then `call` repeatedly; each `call` executes
/// at most one pass through the tasklet's state machine without blocking and
/// reports whether it made progress. A `Done` verdict retires the tasklet.
pub trait Tasklet: fmt::Display {
    /// Attaches the job-cancel signal and performs one-time initialization.
    fn init(&mut self, cancel: CancelSignal) -> Result<(), TaskletError>;

    /// Executes one non-blocking pass of the state machine.
    fn call(&mut self) -> Result<ProgressState, TaskletError>;
}

/// The states a processor tasklet moves through.
///
/// One `call` runs a single pass: transitions within a pass only move the
/// machine forward, and a state that cannot advance reports outstanding work
/// instead of spinning.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaskletState {
    /// Give the processor a chance to work without an inbox.
    NullaryProcess,
    /// Fill the inbox from the input edges and let the processor consume it.
    ProcessInbox,
    /// The processor is emitting its state for the aligned snapshot.
    SaveSnapshot,
    /// Broadcasting the aligned snapshot's barrier downstream.
    EmitBarrier,
    /// Inputs are drained; the processor is completing.
    Complete,
    /// Broadcasting the done sentinel downstream.
    EmitDoneItem,
    /// Terminal; every further `call` reports `Done`.
    End,
}

/// Drives one [`Processor`] through its lifecycle: interleaves input
/// processing with barrier-aligned checkpointing, respects backpressure from
/// the outbox, and emits snapshot barriers and the done sentinel downstream.
pub struct ProcessorTasklet<D> {
    processor: Box<dyn Processor<D>>,
    context: ProcessorContext,
    inbox: Inbox<D>,
    outbox: Outbox<D>,
    instream_groups: VecDeque<Vec<Box<dyn InboundEdgeStream<D>>>>,
    instream_cursor: Option<CircularCursor<Box<dyn InboundEdgeStream<D>>>>,
    /// Ordinal of the edge that most recently filled the inbox.
    curr_ordinal: usize,
    progress: ProgressTracker,
    state: TaskletState,
    /// Per-ordinal flag: a barrier of the current snapshot has arrived.
    barrier_received: SmallVec<[bool; 8]>,
    received_barriers: usize,
    /// Input ordinals whose edge has not yet reported `Done`.
    active_ordinals: usize,
    curr_snapshot: SnapshotId,
    cancel: Option<CancelSignal>,
    logger: Option<TaskletLogger>,
}

impl<D: Data> ProcessorTasklet<D> {
    /// Creates a tasklet over the given input edges and outbox.
    ///
    /// A tasklet constructed with no input edges starts in `Complete`; its
    /// processor produces everything from `complete()`.
    pub fn new(
        processor: Box<dyn Processor<D>>,
        instreams: Vec<Box<dyn InboundEdgeStream<D>>>,
        outbox: Outbox<D>,
        context: ProcessorContext,
        logger: Option<TaskletLogger>,
    ) -> Self {
        let ordinal_count = instreams.len();
        let mut instream_groups = group_by_priority(instreams);
        let instream_cursor = instream_groups.pop_front().map(CircularCursor::new);
        let state = if ordinal_count > 0 {
            TaskletState::NullaryProcess
        } else {
            TaskletState::Complete
        };
        let mut barrier_received = SmallVec::new();
        barrier_received.resize(ordinal_count, false);
        ProcessorTasklet {
            processor,
            context,
            inbox: Inbox::new(),
            outbox,
            instream_groups,
            instream_cursor,
            curr_ordinal: 0,
            progress: ProgressTracker::default(),
            state,
            barrier_received,
            received_barriers: 0,
            active_ordinals: ordinal_count,
            curr_snapshot: 0,
            cancel: None,
            logger,
        }
    }

    fn state_machine_step(&mut self) -> Result<(), TaskletError> {
        match self.state {
            TaskletState::NullaryProcess => {
                if self.processor.try_process() {
                    self.transition(TaskletState::ProcessInbox);
                    self.process_inbox()?;
                } else {
                    self.progress.not_done();
                }
            }
            TaskletState::ProcessInbox => self.process_inbox()?,
            TaskletState::SaveSnapshot => self.save_snapshot(),
            TaskletState::EmitBarrier => self.emit_barrier(),
            TaskletState::Complete => self.try_complete(),
            TaskletState::EmitDoneItem => self.emit_done_item(),
            TaskletState::End => {}
        }
        Ok(())
    }

    fn process_inbox(&mut self) -> Result<(), TaskletError> {
        if self.inbox.is_empty() {
            self.try_fill_inbox()?;
        }
        if self.inbox.is_empty() && self.snapshot_ready() {
            self.transition(TaskletState::SaveSnapshot);
            self.save_snapshot();
            return Ok(());
        }
        if !self.inbox.is_empty() {
            let before = self.inbox.len();
            self.processor.process(self.curr_ordinal, &mut self.inbox);
            self.progress.made_progress(self.inbox.len() < before);
            self.progress.not_done();
            return Ok(());
        }
        if self.instream_cursor.is_none() {
            // Inputs are exhausted and everything was consumed.
            self.transition(TaskletState::Complete);
            self.try_complete();
            return Ok(());
        }
        self.progress.not_done();
        Ok(())
    }

    /// Drains the current priority group into the inbox: visits each edge at
    /// most once, stopping as soon as one of them yields items. An edge whose
    /// barrier for the current snapshot already arrived is skipped under
    /// exactly-once; an edge reporting `Done` retires its ordinal.
    fn try_fill_inbox(&mut self) -> Result<(), TaskletError> {
        let exactly_once =
            self.context.snapshot_context().guarantee() == ProcessingGuarantee::ExactlyOnce;
        let mut remaining = match &self.instream_cursor {
            Some(cursor) => cursor.len(),
            None => return Ok(()),
        };
        while remaining > 0 {
            remaining -= 1;
            let Some(cursor) = self.instream_cursor.as_mut() else {
                return Ok(());
            };
            let ordinal = cursor.value().ordinal();
            if exactly_once && self.barrier_received[ordinal] {
                // Muted until the snapshot in flight completes.
                cursor.advance();
                continue;
            }
            self.curr_ordinal = ordinal;
            let result = cursor.value().drain_to(&mut self.inbox);
            self.progress.made_progress(result.made_progress());
            if result.is_done() {
                if std::mem::replace(&mut self.barrier_received[ordinal], false) {
                    self.received_barriers -= 1;
                }
                self.active_ordinals -= 1;
                cursor.remove_current();
                if cursor.is_empty() {
                    self.instream_cursor =
                        self.instream_groups.pop_front().map(CircularCursor::new);
                }
                return Ok(());
            }
            let observed = match self.inbox.peek_last() {
                Some(Item::Barrier(barrier)) => Some(*barrier),
                _ => None,
            };
            if let Some(barrier) = observed {
                // The barrier never reaches the processor; strip it and stop
                // draining until it has been aligned.
                let _ = self.inbox.pop_last();
                self.observe_snapshot(ordinal, barrier.snapshot_id())?;
                return Ok(());
            }
            if result.made_progress() {
                return Ok(());
            }
            cursor.advance();
        }
        Ok(())
    }

    fn observe_snapshot(&mut self, ordinal: usize, snapshot_id: SnapshotId) -> Result<(), TaskletError> {
        if snapshot_id != self.curr_snapshot {
            return Err(TaskletError::UnexpectedSnapshotId {
                ordinal,
                expected: self.curr_snapshot,
                received: snapshot_id,
            });
        }
        if !std::mem::replace(&mut self.barrier_received[ordinal], true) {
            self.received_barriers += 1;
        }
        if let Some(logger) = &self.logger {
            logger.log(TaskletEvent::BarrierObserved {
                tasklet: self.context.global_index(),
                ordinal,
                snapshot_id,
            });
        }
        Ok(())
    }

    /// Whether every active ordinal contributed a barrier for the current
    /// snapshot. Retired ordinals no longer count.
    fn snapshot_ready(&self) -> bool {
        self.received_barriers > 0 && self.received_barriers == self.active_ordinals
    }

    fn save_snapshot(&mut self) {
        if self.processor.save_snapshot() {
            self.transition(TaskletState::EmitBarrier);
            self.emit_barrier();
        } else {
            self.progress.not_done();
        }
    }

    fn emit_barrier(&mut self) {
        let mut barrier = Some(Item::Barrier(SnapshotBarrier::new(self.curr_snapshot)));
        if self.outbox.offer_to_edges_and_snapshot(&mut barrier).is_done() {
            if let Some(logger) = &self.logger {
                logger.log(TaskletEvent::BarrierEmitted {
                    tasklet: self.context.global_index(),
                    snapshot_id: self.curr_snapshot,
                });
            }
            for received in &mut self.barrier_received {
                *received = false;
            }
            self.received_barriers = 0;
            self.curr_snapshot += 1;
            self.transition(TaskletState::NullaryProcess);
        } else {
            self.progress.not_done();
        }
    }

    fn try_complete(&mut self) {
        if self.processor.complete() {
            self.transition(TaskletState::EmitDoneItem);
            self.emit_done_item();
        } else {
            self.progress.not_done();
        }
    }

    fn emit_done_item(&mut self) {
        let mut done = Some(Item::Done);
        if self.outbox.offer_to_edges_and_snapshot(&mut done).is_done() {
            self.transition(TaskletState::End);
        } else {
            self.progress.not_done();
        }
    }

    fn transition(&mut self, to: TaskletState) {
        if let Some(logger) = &self.logger {
            logger.log(TaskletEvent::Transition {
                tasklet: self.context.global_index(),
                from: self.state,
                to,
            });
        }
        self.state = to;
        self.progress.made_progress(true);
    }
}

impl<D: Data> Tasklet for ProcessorTasklet<D> {
    fn init(&mut self, cancel: CancelSignal) -> Result<(), TaskletError> {
        self.cancel = Some(cancel);
        self.processor
            .init(self.outbox.clone(), &self.context)
            .map_err(|source| TaskletError::ProcessorInitFailure {
                vertex: self.context.vertex_name().to_string(),
                source,
            })
    }

    fn call(&mut self) -> Result<ProgressState, TaskletError> {
        if self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            return Err(TaskletError::Cancelled);
        }
        self.progress.reset();
        self.outbox.reset_progress();
        self.state_machine_step()?;
        let emitted = self.outbox.made_progress();
        self.progress.made_progress(emitted);
        Ok(self.progress.to_progress_state())
    }
}

impl<D> fmt::Display for ProcessorTasklet<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProcessorTasklet {{ vertex={}, processor=#{} }}",
            self.context.vertex_name(),
            self.context.global_index()
        )
    }
}
