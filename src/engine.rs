//! Seam between the pipeline and the backing inference runtime.
//!
//! The pipeline never talks to a model runtime directly; it hands the
//! normalized input tensor to whatever engine was injected at
//! construction and expects the raw grid output back. Swapping runtimes
//! (or running without one, in tests) is a constructor argument.

use std::time::Duration;

use ndarray::{Array, IxDyn};

use crate::error::DetectError;

/// A backing model runtime.
pub trait InferenceEngine: Send {
    /// Run one forward pass. The input is the normalized NHWC tensor
    /// produced by preprocessing; the output must be the raw grid tensor
    /// the decoder expects.
    fn infer(&mut self, input: Array<f32, IxDyn>) -> Result<Array<f32, IxDyn>, DetectError>;
}

/// Engine returning a canned tensor; stands in for a real runtime in
/// tests and the demo binary.
pub struct StubEngine {
    output: Option<Array<f32, IxDyn>>,
    latency: Option<Duration>,
}

impl StubEngine {
    pub fn new(output: Array<f32, IxDyn>) -> Self {
        Self {
            output: Some(output),
            latency: None,
        }
    }

    /// An engine with no model behind it; every cycle fails with
    /// [`DetectError::ModelUnavailable`].
    pub fn uninitialized() -> Self {
        Self {
            output: None,
            latency: None,
        }
    }

    /// Sleep before answering, to exercise in-flight behavior.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

impl InferenceEngine for StubEngine {
    fn infer(&mut self, _input: Array<f32, IxDyn>) -> Result<Array<f32, IxDyn>, DetectError> {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        self.output
            .clone()
            .ok_or_else(|| DetectError::ModelUnavailable("stub engine has no model loaded".into()))
    }
}
