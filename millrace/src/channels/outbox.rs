//! The bounded multi-edge emission buffer of a tasklet.

use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::channels::edge::OutboundEdgeStream;
use crate::item::Item;
use crate::progress::ProgressState;

/// A shareable handle on a tasklet's outbox.
///
/// The tasklet and its processor each hold a clone; all offers are
/// cooperative and never block. A full outbox reports `NoProgress` and the
/// caller retries with the same item on a later scheduling slice.
///
/// At most one broadcast may be in flight at a time: the outbox remembers
/// which edges accepted the current broadcast, and a retry (with an equal
/// item) re-offers only to the edges that refused.
pub struct Outbox<D> {
    inner: Rc<RefCell<OutboxInner<D>>>,
}

impl<D> Clone for Outbox<D> {
    fn clone(&self) -> Self {
        Outbox { inner: Rc::clone(&self.inner) }
    }
}

struct OutboxInner<D> {
    edges: Vec<Box<dyn OutboundEdgeStream<D>>>,
    snapshot_edge: Option<Box<dyn OutboundEdgeStream<D>>>,
    /// Acceptance flags of the in-flight broadcast, one per data edge plus a
    /// trailing slot for the snapshot edge.
    accepted: SmallVec<[bool; 8]>,
    broadcast_in_flight: bool,
    made_progress: bool,
}

impl<D> Outbox<D> {
    /// Creates an outbox over the given outbound edges, in ordinal order,
    /// plus an optional snapshot sink.
    ///
    /// Panics if the edges are not dense in their ordinals; the execution
    /// plan that allocated them is broken in that case.
    pub fn new(
        edges: Vec<Box<dyn OutboundEdgeStream<D>>>,
        snapshot_edge: Option<Box<dyn OutboundEdgeStream<D>>>,
    ) -> Self {
        for (index, edge) in edges.iter().enumerate() {
            assert_eq!(edge.ordinal(), index, "outbound edge ordinals must be dense");
        }
        Outbox {
            inner: Rc::new(RefCell::new(OutboxInner {
                edges,
                snapshot_edge,
                accepted: SmallVec::new(),
                broadcast_in_flight: false,
                made_progress: false,
            })),
        }
    }

    /// Number of outbound data edges.
    pub fn edge_count(&self) -> usize {
        self.inner.borrow().edges.len()
    }

    /// Offers an item to the edge at `ordinal`.
    ///
    /// The item is taken from the slot on acceptance and left in place on
    /// refusal.
    pub fn offer(&mut self, ordinal: usize, item: &mut Option<Item<D>>) -> ProgressState {
        let inner = &mut *self.inner.borrow_mut();
        let state = inner.edges[ordinal].offer(item);
        inner.made_progress |= state.is_done();
        state
    }

    /// Offers a snapshot state entry to the snapshot sink.
    ///
    /// Panics if the outbox was built without one; only jobs with a
    /// processing guarantee allocate snapshot sinks.
    pub fn offer_to_snapshot(&mut self, item: &mut Option<Item<D>>) -> ProgressState {
        let inner = &mut *self.inner.borrow_mut();
        let edge = inner
            .snapshot_edge
            .as_mut()
            .expect("outbox has no snapshot edge");
        let state = edge.offer(item);
        inner.made_progress |= state.is_done();
        state
    }

    /// Whether any offer was accepted since the last `reset_progress`.
    pub(crate) fn made_progress(&self) -> bool {
        self.inner.borrow().made_progress
    }

    /// Clears the per-slice progress flag.
    pub(crate) fn reset_progress(&mut self) {
        self.inner.borrow_mut().made_progress = false;
    }
}

impl<D: Clone> Outbox<D> {
    /// Broadcasts an item to every data edge.
    pub fn offer_to_all(&mut self, item: &mut Option<Item<D>>) -> ProgressState {
        self.broadcast(item, false)
    }

    /// Broadcasts an item to every data edge and to the snapshot sink, if
    /// one is present.
    pub fn offer_to_edges_and_snapshot(&mut self, item: &mut Option<Item<D>>) -> ProgressState {
        self.broadcast(item, true)
    }

    fn broadcast(&mut self, item: &mut Option<Item<D>>, include_snapshot: bool) -> ProgressState {
        let inner = &mut *self.inner.borrow_mut();
        let Some(current) = item.as_ref() else {
            return ProgressState::Done;
        };
        if !inner.broadcast_in_flight {
            inner.accepted.clear();
            inner.accepted.resize(inner.edges.len() + 1, false);
            inner.broadcast_in_flight = true;
        }

        let mut refused = false;
        for (index, edge) in inner.edges.iter_mut().enumerate() {
            if inner.accepted[index] {
                continue;
            }
            let mut slot = Some(current.clone());
            if edge.offer_broadcast(&mut slot).is_done() {
                inner.accepted[index] = true;
                inner.made_progress = true;
            } else {
                refused = true;
            }
        }
        if include_snapshot {
            let snapshot_slot = inner.edges.len();
            if let Some(edge) = inner.snapshot_edge.as_mut() {
                if !inner.accepted[snapshot_slot] {
                    let mut slot = Some(current.clone());
                    if edge.offer(&mut slot).is_done() {
                        inner.accepted[snapshot_slot] = true;
                        inner.made_progress = true;
                    } else {
                        refused = true;
                    }
                }
            }
        }

        if refused {
            ProgressState::NoProgress
        } else {
            item.take();
            inner.broadcast_in_flight = false;
            ProgressState::Done
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// An edge that refuses a configured number of offers before accepting,
    /// recording every offer made to it.
    struct CountingEdge {
        ordinal: usize,
        refusals_left: usize,
        offers: Rc<RefCell<usize>>,
        accepted: Rc<RefCell<Vec<Item<i32>>>>,
    }

    impl CountingEdge {
        fn new(ordinal: usize, refusals: usize) -> (Self, Rc<RefCell<usize>>, Rc<RefCell<Vec<Item<i32>>>>) {
            let offers = Rc::new(RefCell::new(0));
            let accepted = Rc::new(RefCell::new(Vec::new()));
            let edge = CountingEdge {
                ordinal,
                refusals_left: refusals,
                offers: Rc::clone(&offers),
                accepted: Rc::clone(&accepted),
            };
            (edge, offers, accepted)
        }
    }

    impl OutboundEdgeStream<i32> for CountingEdge {
        fn ordinal(&self) -> usize {
            self.ordinal
        }

        fn offer(&mut self, item: &mut Option<Item<i32>>) -> ProgressState {
            *self.offers.borrow_mut() += 1;
            if self.refusals_left > 0 {
                self.refusals_left -= 1;
                return ProgressState::NoProgress;
            }
            if let Some(taken) = item.take() {
                self.accepted.borrow_mut().push(taken);
            }
            ProgressState::Done
        }
    }

    #[test]
    fn partial_broadcast_reoffers_only_refusers() {
        let (eager, eager_offers, eager_accepted) = CountingEdge::new(0, 0);
        let (reluctant, reluctant_offers, reluctant_accepted) = CountingEdge::new(1, 1);
        let mut outbox = Outbox::new(vec![Box::new(eager), Box::new(reluctant)], None);

        let mut slot = Some(Item::Data(7));
        assert_eq!(outbox.offer_to_all(&mut slot), ProgressState::NoProgress);
        assert!(slot.is_some(), "a refused broadcast leaves the item with the caller");

        assert_eq!(outbox.offer_to_all(&mut slot), ProgressState::Done);
        assert!(slot.is_none());

        // The eager edge saw the item exactly once across both attempts.
        assert_eq!(*eager_offers.borrow(), 1);
        assert_eq!(*reluctant_offers.borrow(), 2);
        assert_eq!(*eager_accepted.borrow(), vec![Item::Data(7)]);
        assert_eq!(*reluctant_accepted.borrow(), vec![Item::Data(7)]);
    }

    #[test]
    fn broadcast_includes_snapshot_edge_on_request() {
        let (edge, _, edge_accepted) = CountingEdge::new(0, 0);
        let (snapshot, _, snapshot_accepted) = CountingEdge::new(0, 0);
        let mut outbox = Outbox::new(vec![Box::new(edge)], Some(Box::new(snapshot)));

        let mut slot = Some(Item::Data(1));
        assert_eq!(outbox.offer_to_all(&mut slot), ProgressState::Done);
        assert!(snapshot_accepted.borrow().is_empty());

        let mut slot = Some(Item::Data(2));
        assert_eq!(outbox.offer_to_edges_and_snapshot(&mut slot), ProgressState::Done);
        assert_eq!(*edge_accepted.borrow(), vec![Item::Data(1), Item::Data(2)]);
        assert_eq!(*snapshot_accepted.borrow(), vec![Item::Data(2)]);
    }

    #[test]
    fn snapshot_offer_routes_to_snapshot_edge_only() {
        let (edge, edge_offers, _) = CountingEdge::new(0, 0);
        let (snapshot, _, snapshot_accepted) = CountingEdge::new(0, 0);
        let mut outbox = Outbox::new(vec![Box::new(edge)], Some(Box::new(snapshot)));

        let mut slot = Some(Item::Data(42));
        assert_eq!(outbox.offer_to_snapshot(&mut slot), ProgressState::Done);
        assert_eq!(*edge_offers.borrow(), 0);
        assert_eq!(*snapshot_accepted.borrow(), vec![Item::Data(42)]);
    }

    #[test]
    fn single_edge_offer_reports_refusal() {
        let (edge, _, accepted) = CountingEdge::new(0, 1);
        let mut outbox = Outbox::new(vec![Box::new(edge)], None);

        let mut slot = Some(Item::Data(3));
        assert_eq!(outbox.offer(0, &mut slot), ProgressState::NoProgress);
        assert!(slot.is_some());
        assert_eq!(outbox.offer(0, &mut slot), ProgressState::Done);
        assert_eq!(*accepted.borrow(), vec![Item::Data(3)]);
    }
}
