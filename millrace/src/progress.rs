//! Progress accounting for cooperative scheduling slices.

use serde::{Deserialize, Serialize};

/// The outcome of one scheduling slice.
///
/// Workers use this to decide whether a tasklet should be retired (`Done`),
/// rescheduled eagerly (`MadeProgress`), or deprioritized (`NoProgress`).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ProgressState {
    /// No item moved and no state changed; worth retrying later.
    NoProgress,
    /// At least one item moved or a state transition occurred.
    MadeProgress,
    /// The slice finished the unit of work for good; no further calls needed.
    Done,
}

impl ProgressState {
    /// Whether this outcome represents forward progress.
    ///
    /// Finishing counts as progress: the slice that consumed a stream's done
    /// sentinel did move the computation forward.
    #[inline]
    pub fn made_progress(self) -> bool {
        !matches!(self, ProgressState::NoProgress)
    }

    /// Whether the unit of work has finished for good.
    #[inline]
    pub fn is_done(self) -> bool {
        matches!(self, ProgressState::Done)
    }
}

/// A two-bit accumulator summarizing one `call()` of a tasklet.
///
/// Reset at the start of every call; the call body marks progress as items
/// move and clears `done` whenever it discovers outstanding work.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    made_progress: bool,
    done: bool,
}

impl ProgressTracker {
    /// Begins a fresh slice: no progress yet, presumed done until someone
    /// states otherwise.
    pub fn reset(&mut self) {
        self.made_progress = false;
        self.done = true;
    }

    /// Declares that outstanding work remains after this slice.
    pub fn not_done(&mut self) {
        self.done = false;
    }

    /// Accumulates a progress observation.
    pub fn made_progress(&mut self, progress: bool) {
        self.made_progress |= progress;
    }

    /// Whether nobody declared outstanding work.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Collapses the accumulated flags into a slice outcome.
    pub fn to_progress_state(&self) -> ProgressState {
        if self.done {
            ProgressState::Done
        } else if self.made_progress {
            ProgressState::MadeProgress
        } else {
            ProgressState::NoProgress
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_slice_is_done() {
        let mut tracker = ProgressTracker::default();
        tracker.reset();
        assert_eq!(tracker.to_progress_state(), ProgressState::Done);
    }

    #[test]
    fn not_done_without_progress() {
        let mut tracker = ProgressTracker::default();
        tracker.reset();
        tracker.not_done();
        assert_eq!(tracker.to_progress_state(), ProgressState::NoProgress);
    }

    #[test]
    fn not_done_with_progress() {
        let mut tracker = ProgressTracker::default();
        tracker.reset();
        tracker.not_done();
        tracker.made_progress(false);
        tracker.made_progress(true);
        assert_eq!(tracker.to_progress_state(), ProgressState::MadeProgress);
    }

    #[test]
    fn done_wins_over_progress() {
        let mut tracker = ProgressTracker::default();
        tracker.reset();
        tracker.made_progress(true);
        assert_eq!(tracker.to_progress_state(), ProgressState::Done);
    }

    #[test]
    fn reset_clears_previous_slice() {
        let mut tracker = ProgressTracker::default();
        tracker.reset();
        tracker.not_done();
        tracker.made_progress(true);
        tracker.reset();
        assert_eq!(tracker.to_progress_state(), ProgressState::Done);
    }

    #[test]
    fn done_implies_progress() {
        assert!(ProgressState::Done.made_progress());
        assert!(ProgressState::MadeProgress.made_progress());
        assert!(!ProgressState::NoProgress.made_progress());
    }
}
