//! Live-stream object localization core.
//!
//! Takes camera frames, runs them through a grid-based detector and
//! stabilizes the per-frame detections into one deduplicated set of
//! labeled boxes that downstream collaborators (rendering, anchor
//! placement) can consume.
//!
//! Pipeline: frame → preprocess (crop/scale/rotate) → inference engine →
//! grid decode → non-max suppression → cross-frame accumulation. The
//! accumulated set stops moving once it has been stable for enough
//! consecutive frames; at that point localization is declared complete.

pub mod accumulate; // cross-frame merge + stability latch
pub mod config; // decoder/pipeline configuration + label table
pub mod decoder; // raw grid tensor → candidate boxes
pub mod engine; // inference runtime seam
pub mod error;
pub mod pipeline; // single-worker detection cycle
pub mod preprocess; // crop / scale / rotate / tensor conversion
pub mod suppress; // IoU + non-max suppression
pub mod types;

pub use crate::accumulate::{Accumulator, ResetMode, REPLACEMENT_MARGIN, STABLE_FRAME_LIMIT};
pub use crate::config::{
    DecoderConfig, LabelTable, PipelineConfig, DEFAULT_ANCHORS, DEFAULT_CONFIDENCE_THRESHOLD,
    DEFAULT_INPUT_SIZE,
};
pub use crate::decoder::GridDecoder;
pub use crate::engine::{InferenceEngine, StubEngine};
pub use crate::error::DetectError;
pub use crate::pipeline::{CycleOutput, FrameOutcome, LocalizationSession, Stage};
pub use crate::preprocess::CropAnchor;
pub use crate::suppress::{iou, non_max_suppression};
pub use crate::types::{DetectedBox, Dimensions, ViewTransform};
