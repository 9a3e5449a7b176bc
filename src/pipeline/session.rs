//! Session tying the detection worker to the accumulator.

use image::RgbaImage;
use log::debug;

use crate::accumulate::{Accumulator, ResetMode};
use crate::config::PipelineConfig;
use crate::decoder::GridDecoder;
use crate::engine::InferenceEngine;
use crate::error::DetectError;
use crate::types::{DetectedBox, ViewTransform};

use super::worker::{CycleOutput, DetectionWorker, FrameRequest};
use super::{Stage, StageCell};

/// What happened to a submitted frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame entered the detection cycle.
    Scheduled,
    /// A cycle was already in flight; the frame was discarded.
    Dropped,
    /// Localization is complete; no further frames are accepted.
    Complete,
}

/// Drives the full pipeline: preprocess → infer → decode → suppress on
/// the worker thread, then merge into the accumulator on the caller's
/// thread.
///
/// At most one cycle is ever in flight. A reset does not abort an
/// in-flight cycle; its result is merged into the freshly cleared state
/// when it lands, which keeps the worker slot available instead of
/// wedging the next cycle behind a result nobody collects.
pub struct LocalizationSession {
    worker: DetectionWorker,
    accumulator: Accumulator,
    stage: StageCell,
    in_flight: bool,
    next_seq: u64,
    last_merged_seq: Option<u64>,
    dropped_frames: u64,
}

impl LocalizationSession {
    pub fn new(
        engine: Box<dyn InferenceEngine>,
        decoder: GridDecoder,
        config: PipelineConfig,
        view: ViewTransform,
    ) -> Self {
        let stage = StageCell::new();
        let worker = DetectionWorker::spawn(engine, decoder, config, stage.clone());
        Self {
            worker,
            accumulator: Accumulator::new(view),
            stage,
            in_flight: false,
            next_seq: 0,
            last_merged_seq: None,
            dropped_frames: 0,
        }
    }

    /// Submit one camera frame for detection.
    ///
    /// A cycle that completed since the last call is merged first, so its
    /// error (if any) surfaces here. A zero-area frame is rejected before
    /// anything is scheduled.
    pub fn submit_frame(&mut self, image: RgbaImage) -> Result<FrameOutcome, DetectError> {
        self.poll()?;

        if self.accumulator.localization_complete() {
            return Ok(FrameOutcome::Complete);
        }
        if self.in_flight {
            self.dropped_frames += 1;
            debug!("frame dropped, a detection cycle is still in flight");
            return Ok(FrameOutcome::Dropped);
        }

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectError::InvalidInput(format!(
                "zero-area frame ({width}x{height})"
            )));
        }

        let seq = self.next_seq;
        if !self.worker.submit(FrameRequest { seq, image }) {
            return Err(DetectError::ModelUnavailable(
                "detection worker is not running".into(),
            ));
        }
        self.next_seq += 1;
        self.in_flight = true;
        Ok(FrameOutcome::Scheduled)
    }

    /// Merge a completed cycle without blocking. Returns `true` when a
    /// cycle was merged.
    pub fn poll(&mut self) -> Result<bool, DetectError> {
        match self.worker.try_result() {
            Some(result) => {
                self.take_result(result)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Block until the in-flight cycle (if any) completes, then merge it.
    /// Returns `true` when a cycle was merged.
    pub fn wait_cycle(&mut self) -> Result<bool, DetectError> {
        if !self.in_flight {
            return self.poll();
        }
        match self.worker.wait_result() {
            Some(result) => {
                self.take_result(result)?;
                Ok(true)
            }
            None => {
                self.in_flight = false;
                Err(DetectError::ModelUnavailable(
                    "detection worker is not running".into(),
                ))
            }
        }
    }

    fn take_result(&mut self, result: Result<CycleOutput, DetectError>) -> Result<(), DetectError> {
        // the cycle is over either way; a failed one must not wedge the slot
        self.in_flight = false;
        let output = result?;
        self.merge_output(output);
        Ok(())
    }

    fn merge_output(&mut self, output: CycleOutput) {
        debug_assert!(self.last_merged_seq.map_or(true, |last| output.seq > last));
        self.stage.store(Stage::Merging);
        let incoming = output.boxes.len();
        self.accumulator.merge(output.boxes);
        self.last_merged_seq = Some(output.seq);
        debug!(
            "cycle {} merged {} boxes, {} accumulated, {} stable frames",
            output.seq,
            incoming,
            self.accumulator.boxes().len(),
            self.accumulator.stable_frames()
        );
        self.stage.store(if self.accumulator.localization_complete() {
            Stage::Done
        } else {
            Stage::Idle
        });
    }

    /// The accumulated, deduplicated set.
    pub fn boxes(&self) -> &[DetectedBox] {
        self.accumulator.boxes()
    }

    pub fn localization_complete(&self) -> bool {
        self.accumulator.localization_complete()
    }

    pub fn stable_frames(&self) -> u32 {
        self.accumulator.stable_frames()
    }

    pub fn stage(&self) -> Stage {
        self.stage.load()
    }

    /// Frames discarded because a cycle was already in flight.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Declare localization complete without waiting for stability.
    pub fn force_complete(&mut self) {
        self.accumulator.force_complete();
        self.stage.store(Stage::Done);
    }

    /// Restart detection. In-flight work is not aborted; its result will
    /// merge into the cleared state when it completes. Returns `true`
    /// when the caller must clear downstream anchors as well.
    #[must_use]
    pub fn reset(&mut self, mode: ResetMode) -> bool {
        self.stage.store(Stage::Idle);
        self.accumulator.reset(mode)
    }

    /// Flag an accumulated box as consumed by the anchor-placement
    /// collaborator.
    pub fn mark_consumed(&mut self, index: usize) -> bool {
        self.accumulator.mark_consumed(index)
    }

    /// The screen mapping accumulated boxes are matched and rendered in.
    pub fn view(&self) -> ViewTransform {
        self.accumulator.view()
    }
}
