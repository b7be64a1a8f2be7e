//! Frame jobs: pre-built protocol messages replayed one per notification.
//!
//! - [`Frame`] / [`FrameSequence`]: immutable, cheaply cloned frame catalog
//! - [`FrameSequencer`]: the job state machine, free of I/O; the driver
//!   performs the writes it asks for

mod frame;
mod sequencer;

pub use frame::*;
pub use sequencer::*;
