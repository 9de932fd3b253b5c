//! Buffered event logging for tasklet execution.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::snapshot::SnapshotId;
use crate::tasklet::TaskletState;

/// Number of buffered events after which a logger flushes on its own.
const BUFFER_CAPACITY: usize = 1024;

/// A buffering logger bound to an action over timestamped event batches.
///
/// Events record their offset from a common start instant at the moment of
/// logging; the action sees them in batches, either when the buffer fills or
/// on an explicit `flush`.
pub struct Logger<E> {
    time: Instant,
    action: Rc<RefCell<Box<dyn FnMut(Duration, &[(Duration, E)])>>>,
    buffer: Rc<RefCell<Vec<(Duration, E)>>>,
}

impl<E> Clone for Logger<E> {
    fn clone(&self) -> Self {
        Logger {
            time: self.time,
            action: Rc::clone(&self.action),
            buffer: Rc::clone(&self.buffer),
        }
    }
}

impl<E> Logger<E> {
    /// Allocates a new shareable logger bound to a write destination.
    pub fn new(time: Instant, action: impl FnMut(Duration, &[(Duration, E)]) + 'static) -> Self {
        Logger {
            time,
            action: Rc::new(RefCell::new(Box::new(action))),
            buffer: Rc::new(RefCell::new(Vec::with_capacity(BUFFER_CAPACITY))),
        }
    }

    /// Logs an event.
    ///
    /// The event is timestamped now but may reach the action later, when the
    /// buffer fills or the logger is flushed.
    pub fn log(&self, event: E) {
        let mut buffer = self.buffer.borrow_mut();
        buffer.push((self.time.elapsed(), event));
        if buffer.len() == BUFFER_CAPACITY {
            let mut action = self.action.borrow_mut();
            (*action)(self.time.elapsed(), &buffer[..]);
            buffer.clear();
        }
    }

    /// Flushes buffered events to the action.
    pub fn flush(&self) {
        let mut buffer = self.buffer.borrow_mut();
        let mut action = self.action.borrow_mut();
        (*action)(self.time.elapsed(), &buffer[..]);
        buffer.clear();
    }
}

/// Events describing the execution of processor tasklets.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum TaskletEvent {
    /// The state machine moved between states.
    Transition {
        /// Job-wide index of the tasklet.
        tasklet: usize,
        /// State being left.
        from: TaskletState,
        /// State being entered.
        to: TaskletState,
    },
    /// A snapshot barrier was observed on an input edge.
    BarrierObserved {
        /// Job-wide index of the tasklet.
        tasklet: usize,
        /// Input ordinal the barrier arrived on.
        ordinal: usize,
        /// Epoch the barrier delimits.
        snapshot_id: SnapshotId,
    },
    /// A snapshot barrier was broadcast downstream.
    BarrierEmitted {
        /// Job-wide index of the tasklet.
        tasklet: usize,
        /// Epoch the barrier delimits.
        snapshot_id: SnapshotId,
    },
}

/// Logger for tasklet execution events.
pub type TaskletLogger = Logger<TaskletEvent>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flush_delivers_buffered_events() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let logger = Logger::new(Instant::now(), move |_, batch: &[(Duration, u32)]| {
            sink.borrow_mut().extend(batch.iter().map(|(_, event)| *event));
        });

        logger.log(1);
        logger.log(2);
        assert!(seen.borrow().is_empty());
        logger.flush();
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }
}
