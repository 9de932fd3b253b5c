//! A deterministic, single-threaded driver that exercises a [`Processor`] in
//! isolation, against the same inbox/outbox discipline the production
//! tasklet imposes.
//!
//! The driver preloads an inbox with the full input, repeatedly invokes
//! `process(0, inbox)` until the inbox drains, then `complete()` until the
//! processor reports completion, collecting everything emitted along the way
//! and comparing it (order-sensitively) against the expected output.
//! Cooperative processors run against a capacity-1 outbox and are re-entered
//! while it is full, verifying they tolerate backpressure. With snapshots
//! enabled, every step is followed by a full save/restore round-trip onto a
//! fresh processor instance, verifying that state survives.
//!
//! `try_process` is never invoked, and all input arrives on ordinal 0.

#![forbid(missing_docs)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::Arc;

use millrace::channels::edge::OutboundEdgeStream;
use millrace::processor::{
    MemberAddress, MetaSupplierContext, ProcessorContext, ProcessorMetaSupplier, ProcessorSupplier,
};
use millrace::snapshot::{ProcessingGuarantee, SnapshotContext};
use millrace::{Data, Inbox, Item, Outbox, Processor, ProgressState};

/// Runs `input` through processors obtained from `new_processor` and asserts
/// that everything emitted equals `expected`, in order.
///
/// With `assert_progress`, every invocation of the processor must consume
/// input or emit output. With `do_snapshots`, every step is followed by a
/// snapshot round-trip onto a fresh instance from `new_processor`.
///
/// Panics on any violation.
pub fn test_processor<D, F>(
    mut new_processor: F,
    input: Vec<D>,
    expected: Vec<D>,
    assert_progress: bool,
    do_snapshots: bool,
) where
    D: Data + PartialEq + Debug,
    F: FnMut() -> Box<dyn Processor<D>>,
{
    run(
        &mut || Some(new_processor()),
        input,
        expected,
        assert_progress,
        do_snapshots,
    );
}

/// Variant of [`test_processor`] for a bare processor instance.
///
/// The instance is used once; since no fresh instance can be obtained,
/// snapshot testing is unavailable through this entry point.
pub fn test_single_processor<D>(
    processor: Box<dyn Processor<D>>,
    input: Vec<D>,
    expected: Vec<D>,
    assert_progress: bool,
) where
    D: Data + PartialEq + Debug,
{
    let mut slot = Some(processor);
    run(&mut move || slot.take(), input, expected, assert_progress, false);
}

/// Variant of [`test_processor`] that asks a [`ProcessorSupplier`] for one
/// processor at a time, as deployed on the local member.
pub fn test_processor_supplier<D>(
    supplier: &mut dyn ProcessorSupplier<D>,
    input: Vec<D>,
    expected: Vec<D>,
    assert_progress: bool,
    do_snapshots: bool,
) where
    D: Data + PartialEq + Debug,
{
    run(
        &mut || supplier.take(1).pop(),
        input,
        expected,
        assert_progress,
        do_snapshots,
    );
}

/// Variant of [`test_processor`] that initializes a [`ProcessorMetaSupplier`]
/// with a synthetic single-member context and derives the local member's
/// supplier from it.
pub fn test_processor_meta<D>(
    meta: &mut dyn ProcessorMetaSupplier<D>,
    input: Vec<D>,
    expected: Vec<D>,
    assert_progress: bool,
    do_snapshots: bool,
) where
    D: Data + PartialEq + Debug,
{
    let address = MemberAddress::from(([127, 0, 0, 1], 5701));
    meta.init(&MetaSupplierContext::new(address, 1, 1));
    let mut suppliers = meta.get(&[address]);
    let mut supplier = suppliers(address);
    test_processor_supplier(&mut *supplier, input, expected, assert_progress, do_snapshots);
}

type SharedQueue<D> = Rc<RefCell<VecDeque<Item<D>>>>;

/// The sink behind the test outbox: a queue with an optional capacity,
/// refusing offers when full.
struct QueueCollector<D> {
    ordinal: usize,
    capacity: Option<usize>,
    queue: SharedQueue<D>,
}

impl<D> OutboundEdgeStream<D> for QueueCollector<D> {
    fn ordinal(&self) -> usize {
        self.ordinal
    }

    fn offer(&mut self, item: &mut Option<Item<D>>) -> ProgressState {
        let mut queue = self.queue.borrow_mut();
        if self.capacity.is_some_and(|capacity| queue.len() >= capacity) {
            return ProgressState::NoProgress;
        }
        if let Some(taken) = item.take() {
            queue.push_back(taken);
        }
        ProgressState::Done
    }
}

fn build_outbox<D: Data>(capacity: Option<usize>) -> (Outbox<D>, SharedQueue<D>, SharedQueue<D>) {
    let data = Rc::new(RefCell::new(VecDeque::new()));
    let snapshot = Rc::new(RefCell::new(VecDeque::new()));
    let outbox = Outbox::new(
        vec![Box::new(QueueCollector {
            ordinal: 0,
            capacity,
            queue: Rc::clone(&data),
        })],
        Some(Box::new(QueueCollector {
            ordinal: 0,
            capacity: None,
            queue: Rc::clone(&snapshot),
        })),
    );
    (outbox, data, snapshot)
}

fn drain_into<D: Debug>(queue: &SharedQueue<D>, output: &mut Vec<D>) {
    for item in queue.borrow_mut().drain(..) {
        match item {
            Item::Data(element) => output.push(element),
            other => panic!("processor emitted a non-data item: {other:?}"),
        }
    }
}

fn run<D>(
    supplier: &mut dyn FnMut() -> Option<Box<dyn Processor<D>>>,
    input: Vec<D>,
    expected: Vec<D>,
    assert_progress: bool,
    do_snapshots: bool,
) where
    D: Data + PartialEq + Debug,
{
    let mut processor = supplier().expect("supplier yielded no processor");
    let cooperative = processor.is_cooperative();
    let (outbox, data_queue, snapshot_queue) = build_outbox::<D>(cooperative.then_some(1));
    let guarantee = if do_snapshots {
        ProcessingGuarantee::ExactlyOnce
    } else {
        ProcessingGuarantee::None
    };
    let context = ProcessorContext::new("test-vertex", 0, Arc::new(SnapshotContext::new(guarantee)));
    processor
        .init(outbox.clone(), &context)
        .expect("processor failed to initialize");

    let mut inbox = Inbox::new();
    inbox.extend(input.into_iter().map(Item::Data));
    let mut actual = Vec::new();

    while !inbox.is_empty() {
        let last_inbox_size = inbox.len();
        processor.process(0, &mut inbox);
        if cooperative && data_queue.borrow().len() == 1 {
            // The outbox is full; the processor must tolerate the repeat.
            processor.process(0, &mut inbox);
        }
        if assert_progress {
            assert!(
                inbox.len() < last_inbox_size || !data_queue.borrow().is_empty(),
                "process() neither consumed input nor emitted output"
            );
        }
        drain_into(&data_queue, &mut actual);
        if do_snapshots {
            processor = snapshot_and_restore(
                supplier,
                processor,
                &outbox,
                &data_queue,
                &snapshot_queue,
                &context,
                assert_progress,
                &mut actual,
            );
        }
    }

    loop {
        let done = processor.complete();
        if assert_progress {
            assert!(
                done || !data_queue.borrow().is_empty(),
                "complete() neither finished nor emitted output"
            );
        }
        drain_into(&data_queue, &mut actual);
        if done {
            break;
        }
        if do_snapshots {
            processor = snapshot_and_restore(
                supplier,
                processor,
                &outbox,
                &data_queue,
                &snapshot_queue,
                &context,
                assert_progress,
                &mut actual,
            );
        }
    }

    assert_eq!(actual, expected, "processor output mismatch");
}

/// Saves the processor's state through the snapshot sink, then builds a
/// fresh instance and restores it from what was saved, returning the fresh
/// instance as the one to continue with.
#[allow(clippy::too_many_arguments)]
fn snapshot_and_restore<D>(
    supplier: &mut dyn FnMut() -> Option<Box<dyn Processor<D>>>,
    mut processor: Box<dyn Processor<D>>,
    outbox: &Outbox<D>,
    data_queue: &SharedQueue<D>,
    snapshot_queue: &SharedQueue<D>,
    context: &ProcessorContext,
    assert_progress: bool,
    actual: &mut Vec<D>,
) -> Box<dyn Processor<D>>
where
    D: Data + PartialEq + Debug,
{
    let mut restore_inbox = Inbox::new();
    loop {
        let done = processor.save_snapshot();
        if assert_progress {
            assert!(
                done || !snapshot_queue.borrow().is_empty() || !data_queue.borrow().is_empty(),
                "save_snapshot() neither finished nor emitted anything"
            );
        }
        restore_inbox.extend(snapshot_queue.borrow_mut().drain(..));
        drain_into(data_queue, actual);
        if done {
            break;
        }
    }
    drop(processor);

    let mut fresh = supplier().expect("supplier yielded no fresh processor for restore");
    fresh
        .init(outbox.clone(), context)
        .expect("restored processor failed to initialize");
    if !restore_inbox.is_empty() {
        while !restore_inbox.is_empty() {
            let before = restore_inbox.len();
            fresh.restore_snapshot(&mut restore_inbox);
            if assert_progress {
                assert!(
                    restore_inbox.len() < before,
                    "restore_snapshot() consumed nothing"
                );
            }
        }
        fresh.finish_snapshot_restore();
    }
    fresh
}
