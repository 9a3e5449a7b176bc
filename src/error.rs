//! Error taxonomy of the detection pipeline.

use thiserror::Error;

/// Errors a detection cycle can surface.
///
/// An empty detection result is not an error; a frame with nothing in it
/// is a normal outcome that simply leaves the accumulated set alone.
#[derive(Debug, Error)]
pub enum DetectError {
    /// The input was rejected before any processing started: zero-area
    /// image, out-of-bounds crop rectangle, malformed output tensor or an
    /// empty label table.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backing inference engine is missing or failed to produce
    /// output. The current cycle is lost; the caller may retry after
    /// reinitializing the engine, the pipeline never retries on its own.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
}
