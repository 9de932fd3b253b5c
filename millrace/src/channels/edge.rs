//! Contracts for the inbound and outbound edges of a tasklet, and the
//! queue-backed pair used for worker-local connections.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::channels::inbox::Inbox;
use crate::item::Item;
use crate::progress::ProgressState;

/// An ordered source of items feeding one input ordinal of a tasklet.
pub trait InboundEdgeStream<D> {
    /// The input ordinal this edge feeds. Ordinals are dense non-negative
    /// integers unique per tasklet.
    fn ordinal(&self) -> usize;

    /// Scheduling priority of this edge; lower priorities are exhausted
    /// before higher ones are touched.
    fn priority(&self) -> i32;

    /// Moves available items into `inbox`.
    ///
    /// Stops after moving a snapshot barrier, which is then the last item of
    /// the inbox. Consumes the stream's done sentinel and reports `Done` in
    /// its stead; the sentinel itself never enters the inbox.
    fn drain_to(&mut self, inbox: &mut Inbox<D>) -> ProgressState;
}

/// An ordered sink receiving items from one output ordinal of a tasklet.
///
/// An offered item is passed in an option slot: taken on acceptance, left in
/// place on refusal, in which case the caller holds on to it and retries on a
/// later scheduling slice. Offers never block.
pub trait OutboundEdgeStream<D> {
    /// The output ordinal this edge drains.
    fn ordinal(&self) -> usize;

    /// Offers one item along the edge's partitioned route.
    ///
    /// Returns `Done` if the item was accepted (and taken from the slot),
    /// `NoProgress` if it was refused.
    fn offer(&mut self, item: &mut Option<Item<D>>) -> ProgressState;

    /// Offers one item to every member hosting a downstream tasklet of this
    /// edge. For a worker-local edge there is exactly one such destination.
    fn offer_broadcast(&mut self, item: &mut Option<Item<D>>) -> ProgressState {
        self.offer(item)
    }
}

type SharedQueue<D> = Rc<RefCell<VecDeque<Item<D>>>>;

/// Allocates a worker-local edge: a bounded queue with the producing
/// tasklet's outbound end and the consuming tasklet's inbound end.
///
/// `capacity` of `None` leaves the queue unbounded; cooperative producers are
/// given small capacities to force interleaving with their consumers.
pub fn local_channel<D>(
    outbound_ordinal: usize,
    inbound_ordinal: usize,
    priority: i32,
    capacity: Option<usize>,
) -> (LocalOutboundEdge<D>, LocalInboundEdge<D>) {
    let queue: SharedQueue<D> = Rc::new(RefCell::new(VecDeque::new()));
    let outbound = LocalOutboundEdge {
        ordinal: outbound_ordinal,
        capacity,
        queue: Rc::clone(&queue),
    };
    let inbound = LocalInboundEdge {
        ordinal: inbound_ordinal,
        priority,
        queue,
        exhausted: false,
    };
    (outbound, inbound)
}

/// The producing end of a worker-local edge.
pub struct LocalOutboundEdge<D> {
    ordinal: usize,
    capacity: Option<usize>,
    queue: SharedQueue<D>,
}

impl<D> OutboundEdgeStream<D> for LocalOutboundEdge<D> {
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

/// The consuming end of a worker-local edge.
pub struct LocalInboundEdge<D> {
    ordinal: usize,
    priority: i32,
    queue: SharedQueue<D>,
    exhausted: bool,
}

impl<D> LocalInboundEdge<D> {
    /// Creates an inbound edge preloaded with a fixed item sequence, for
    /// deterministic drives of a single tasklet.
    pub fn from_items(
        ordinal: usize,
        priority: i32,
        items: impl IntoIterator<Item = Item<D>>,
    ) -> Self {
        LocalInboundEdge {
            ordinal,
            priority,
            queue: Rc::new(RefCell::new(items.into_iter().collect())),
            exhausted: false,
        }
    }
}

impl<D> InboundEdgeStream<D> for LocalInboundEdge<D> {
    fn ordinal(&self) -> usize {
        self.ordinal
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn drain_to(&mut self, inbox: &mut Inbox<D>) -> ProgressState {
        if self.exhausted {
            return ProgressState::Done;
        }
        let mut queue = self.queue.borrow_mut();
        let mut drained = false;
        while let Some(item) = queue.pop_front() {
            match item {
                Item::Done => {
                    self.exhausted = true;
                    return ProgressState::Done;
                }
                Item::Barrier(_) => {
                    inbox.add(item);
                    return ProgressState::MadeProgress;
                }
                _ => {
                    inbox.add(item);
                    drained = true;
                }
            }
        }
        if drained {
            ProgressState::MadeProgress
        } else {
            ProgressState::NoProgress
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::item::SnapshotBarrier;

    #[test]
    fn capacity_one_refuses_second_offer() {
        let (mut outbound, _inbound) = local_channel::<i32>(0, 0, 0, Some(1));
        let mut first = Some(Item::Data(1));
        assert_eq!(outbound.offer(&mut first), ProgressState::Done);
        assert!(first.is_none());

        let mut second = Some(Item::Data(2));
        assert_eq!(outbound.offer(&mut second), ProgressState::NoProgress);
        assert_eq!(second, Some(Item::Data(2)));
    }

    #[test]
    fn drain_stops_after_barrier() {
        let mut edge = LocalInboundEdge::from_items(
            0,
            0,
            vec![
                Item::Data("a"),
                Item::Barrier(SnapshotBarrier::new(0)),
                Item::Data("b"),
                Item::Done,
            ],
        );
        let mut inbox = Inbox::new();

        assert_eq!(edge.drain_to(&mut inbox), ProgressState::MadeProgress);
        assert_eq!(inbox.len(), 2);
        assert!(matches!(inbox.peek_last(), Some(Item::Barrier(_))));

        // The post-barrier item arrives on the next drain, the sentinel
        // is consumed and reported as `Done`.
        while inbox.poll().is_some() {}
        assert_eq!(edge.drain_to(&mut inbox), ProgressState::Done);
        assert_eq!(inbox.len(), 1);
        assert!(matches!(inbox.peek_last(), Some(Item::Data("b"))));
    }

    #[test]
    fn drain_of_empty_queue_makes_no_progress() {
        let (_outbound, mut inbound) = local_channel::<i32>(0, 0, 0, None);
        let mut inbox = Inbox::new();
        assert_eq!(inbound.drain_to(&mut inbox), ProgressState::NoProgress);
        assert!(inbox.is_empty());
    }

    #[test]
    fn channel_moves_items_end_to_end() {
        let (mut outbound, mut inbound) = local_channel::<i32>(1, 0, 0, None);
        for value in [1, 2, 3] {
            let mut slot = Some(Item::Data(value));
            outbound.offer(&mut slot);
        }
        let mut done = Some(Item::Done);
        outbound.offer(&mut done);

        let mut inbox = Inbox::new();
        assert_eq!(inbound.drain_to(&mut inbox), ProgressState::Done);
        assert_eq!(inbox.poll(), Some(Item::Data(1)));
        assert_eq!(inbox.poll(), Some(Item::Data(2)));
        assert_eq!(inbox.poll(), Some(Item::Data(3)));
        assert!(inbox.is_empty());
    }
}
