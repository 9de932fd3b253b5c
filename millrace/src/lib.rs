//! Millrace is the per-operator execution core of a distributed stream/batch
//! dataflow engine.
//!
//! The code is organized so the pieces depend as little as possible on each
//! other.
//!
//! **Items and channels**: the [`item`] module defines the unit moved between
//! operators; the [`channels`] module defines the inbox a tasklet drains
//! inputs into, the outbox it emits through, the edge contracts at both ends,
//! and the priority-grouped cursor over input edges.
//!
//! **Processors**: the [`processor`] module defines the operator contract a
//! user implements, and the supplier hierarchy that deploys operator
//! instances across a cluster.
//!
//! **Tasklets**: the [`tasklet`] module drives one processor through its
//! lifecycle on a shared, non-blocking worker pool, aligning distributed
//! snapshots on input edges and emitting barriers downstream.
//!
//! A worker repeatedly invokes [`Tasklet::call`]; each invocation runs at
//! most one pass of the state machine and reports a [`ProgressState`] the
//! worker uses to decide what to schedule next. Backpressure is cooperative
//! throughout: a full outbox refuses items, and the refused work is retried
//! on a later slice.

#![forbid(missing_docs)]

pub mod channels;
pub mod error;
pub mod item;
pub mod logging;
pub mod processor;
pub mod progress;
pub mod snapshot;
pub mod tasklet;

pub use channels::inbox::Inbox;
pub use channels::outbox::Outbox;
pub use error::TaskletError;
pub use item::Item;
pub use processor::Processor;
pub use progress::ProgressState;
pub use tasklet::{ProcessorTasklet, Tasklet};

/// A composite trait for types usable as data elements on dataflow edges.
///
/// The `Data` trait is necessary for all payloads that go along dataflow
/// edges: broadcasts clone the element once per receiving edge.
pub trait Data: Clone + 'static {}
impl<T: Clone + 'static> Data for T {}
