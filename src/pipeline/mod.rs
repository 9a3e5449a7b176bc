//! Detection pipeline: one in-flight cycle at a time over a worker
//! thread.
//!
//! A [`LocalizationSession`] owns the worker and the accumulator. Frames
//! submitted while a cycle is in flight are dropped, not queued; for a
//! live stream, freshness beats completeness. Results come back in
//! submission order and are merged synchronously before the next frame
//! is accepted.

mod session;
mod worker;

pub use session::{FrameOutcome, LocalizationSession};
pub use worker::CycleOutput;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Where the current detection cycle is. The pipeline only suspends at
/// stage boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Idle = 0,
    Preprocessing = 1,
    Decoding = 2,
    Merging = 3,
    Done = 4,
}

/// Shared stage indicator; the worker writes the in-cycle stages, the
/// session writes the rest.
#[derive(Clone)]
pub(crate) struct StageCell(Arc<AtomicU8>);

impl StageCell {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicU8::new(Stage::Idle as u8)))
    }

    pub(crate) fn store(&self, stage: Stage) {
        self.0.store(stage as u8, Ordering::Relaxed);
    }

    pub(crate) fn load(&self) -> Stage {
        match self.0.load(Ordering::Relaxed) {
            1 => Stage::Preprocessing,
            2 => Stage::Decoding,
            3 => Stage::Merging,
            4 => Stage::Done,
            _ => Stage::Idle,
        }
    }
}
