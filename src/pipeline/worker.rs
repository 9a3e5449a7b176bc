//! Worker thread running the per-frame detection cycle:
//! preprocess → infer → decode → suppress.

use crossbeam_channel::{bounded, Receiver, Sender};
use image::RgbaImage;
use log::debug;
use std::thread::{self, JoinHandle};

use crate::config::PipelineConfig;
use crate::decoder::GridDecoder;
use crate::engine::InferenceEngine;
use crate::error::DetectError;
use crate::preprocess;
use crate::suppress::non_max_suppression;
use crate::types::DetectedBox;

use super::{Stage, StageCell};

/// One completed detection cycle.
#[derive(Clone, Debug)]
pub struct CycleOutput {
    /// Sequence number of the frame that produced these boxes.
    pub seq: u64,
    /// Suppressed per-frame box list, ready to merge.
    pub boxes: Vec<DetectedBox>,
}

pub(crate) struct FrameRequest {
    pub seq: u64,
    pub image: RgbaImage,
}

/// Handle to the detection worker thread.
pub(crate) struct DetectionWorker {
    requests: Option<Sender<FrameRequest>>,
    results: Receiver<Result<CycleOutput, DetectError>>,
    handle: Option<JoinHandle<()>>,
}

impl DetectionWorker {
    pub(crate) fn spawn(
        mut engine: Box<dyn InferenceEngine>,
        decoder: GridDecoder,
        config: PipelineConfig,
        stage: StageCell,
    ) -> Self {
        // capacity 1 is enough: the session keeps at most one cycle in flight
        let (request_tx, request_rx) = bounded::<FrameRequest>(1);
        let (result_tx, result_rx) = bounded::<Result<CycleOutput, DetectError>>(1);

        let handle = thread::spawn(move || {
            for request in request_rx.iter() {
                let seq = request.seq;
                let outcome = run_cycle(engine.as_mut(), &decoder, &config, request.image, &stage)
                    .map(|boxes| CycleOutput { seq, boxes });
                if result_tx.send(outcome).is_err() {
                    break; // session is gone
                }
            }
            debug!("detection worker shutting down");
        });

        Self {
            requests: Some(request_tx),
            results: result_rx,
            handle: Some(handle),
        }
    }

    /// Hand a frame to the worker. Fails only when the worker is gone.
    pub(crate) fn submit(&self, request: FrameRequest) -> bool {
        self.requests
            .as_ref()
            .is_some_and(|tx| tx.try_send(request).is_ok())
    }

    pub(crate) fn try_result(&self) -> Option<Result<CycleOutput, DetectError>> {
        self.results.try_recv().ok()
    }

    pub(crate) fn wait_result(&self) -> Option<Result<CycleOutput, DetectError>> {
        self.results.recv().ok()
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        // closing the request channel ends the worker loop
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_cycle(
    engine: &mut dyn InferenceEngine,
    decoder: &GridDecoder,
    config: &PipelineConfig,
    image: RgbaImage,
    stage: &StageCell,
) -> Result<Vec<DetectedBox>, DetectError> {
    stage.store(Stage::Preprocessing);
    let square = preprocess::preprocess(&image, config.input_size, config.crop_anchor)?;
    let input = preprocess::to_input_tensor(&square);

    stage.store(Stage::Decoding);
    let raw = engine.infer(input)?;
    let candidates = decoder.decode(&raw)?;
    debug!("cycle decoded {} candidate boxes", candidates.len());

    Ok(non_max_suppression(
        candidates,
        config.nms_iou_threshold,
        config.max_boxes_per_frame,
    ))
}
