//! The buffers and edges items travel through between processors.

pub mod cursor;
pub mod edge;
pub mod inbox;
pub mod outbox;
