//! Priority-grouped circular iteration over inbound edges.

use std::collections::VecDeque;

use itertools::Itertools;

use crate::channels::edge::InboundEdgeStream;

/// Circular iteration over a list, with removal of the current element.
///
/// Removal shrinks the list without perturbing the order of the remaining
/// elements; the cursor then addresses the element that followed the removed
/// one.
#[derive(Debug)]
pub struct CircularCursor<T> {
    items: Vec<T>,
    position: usize,
}

impl<T> CircularCursor<T> {
    /// Creates a cursor over `items`, positioned at the first element.
    ///
    /// The list must be non-empty; `value` addresses the current element
    /// unconditionally.
    pub fn new(items: Vec<T>) -> Self {
        debug_assert!(!items.is_empty());
        CircularCursor { items, position: 0 }
    }

    /// The element the cursor currently addresses.
    pub fn value(&mut self) -> &mut T {
        &mut self.items[self.position]
    }

    /// Moves to the next element, returning `false` when wrapping back to
    /// the front of the list.
    pub fn advance(&mut self) -> bool {
        self.position += 1;
        if self.position == self.items.len() {
            self.position = 0;
            false
        } else {
            true
        }
    }

    /// Removes and returns the current element.
    pub fn remove_current(&mut self) -> T {
        let removed = self.items.remove(self.position);
        if self.position == self.items.len() {
            self.position = 0;
        }
        removed
    }

    /// Number of remaining elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether every element has been removed.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Groups inbound edges by ascending priority, preserving arrival order
/// within each group. The front group is drained to exhaustion before the
/// next one is touched.
pub fn group_by_priority<D>(
    mut edges: Vec<Box<dyn InboundEdgeStream<D>>>,
) -> VecDeque<Vec<Box<dyn InboundEdgeStream<D>>>> {
    edges.sort_by_key(|edge| edge.priority());
    let chunks = edges.into_iter().chunk_by(|edge| edge.priority());
    let mut grouped = VecDeque::new();
    for (_, chunk) in &chunks {
        grouped.push_back(chunk.collect());
    }
    grouped
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::channels::edge::LocalInboundEdge;
    use crate::item::Item;

    #[test]
    fn advances_circularly() {
        let mut cursor = CircularCursor::new(vec![1, 2, 3]);
        assert_eq!(*cursor.value(), 1);
        assert!(cursor.advance());
        assert_eq!(*cursor.value(), 2);
        assert!(cursor.advance());
        assert_eq!(*cursor.value(), 3);
        assert!(!cursor.advance());
        assert_eq!(*cursor.value(), 1);
    }

    #[test]
    fn removal_keeps_order() {
        let mut cursor = CircularCursor::new(vec![1, 2, 3]);
        cursor.advance();
        assert_eq!(cursor.remove_current(), 2);
        assert_eq!(*cursor.value(), 3);
        assert!(!cursor.advance());
        assert_eq!(*cursor.value(), 1);
        assert_eq!(cursor.len(), 2);
    }

    #[test]
    fn removal_of_last_element_wraps() {
        let mut cursor = CircularCursor::new(vec![1, 2]);
        cursor.advance();
        assert_eq!(cursor.remove_current(), 2);
        assert_eq!(*cursor.value(), 1);
        assert_eq!(cursor.remove_current(), 1);
        assert!(cursor.is_empty());
    }

    #[test]
    fn groups_ascending_and_stable() {
        let edges: Vec<Box<dyn InboundEdgeStream<i32>>> = vec![
            Box::new(LocalInboundEdge::from_items(0, 1, Vec::<Item<i32>>::new())),
            Box::new(LocalInboundEdge::from_items(1, 0, Vec::<Item<i32>>::new())),
            Box::new(LocalInboundEdge::from_items(2, 1, Vec::<Item<i32>>::new())),
            Box::new(LocalInboundEdge::from_items(3, 0, Vec::<Item<i32>>::new())),
        ];
        let groups = group_by_priority(edges);
        let ordinals: Vec<Vec<usize>> = groups
            .iter()
            .map(|group| group.iter().map(|edge| edge.ordinal()).collect())
            .collect();
        assert_eq!(ordinals, vec![vec![1, 3], vec![0, 2]]);
    }
}
