//! Grid decoding of the detector's raw output tensor.
//!
//! The backing network divides its square input into a coarse cell grid
//! and predicts a fixed number of anchor-shaped boxes per cell. Each
//! prediction block holds 4 raw box offsets, 1 raw objectness value and
//! one logit per class. Decoding walks those blocks, maps them to labeled
//! pixel-space boxes and discards everything below the confidence
//! threshold.

use ndarray::{Array, IxDyn};

use crate::config::{DecoderConfig, LabelTable};
use crate::error::DetectError;
use crate::types::{DetectedBox, Dimensions};

/// Channels preceding the class logits: tx, ty, tw, th, objectness.
const BOX_INFO_FEATURES: usize = 5;

pub struct GridDecoder {
    config: DecoderConfig,
    labels: LabelTable,
}

impl GridDecoder {
    pub fn new(config: DecoderConfig, labels: LabelTable) -> Result<Self, DetectError> {
        config.validate()?;
        if labels.len() != config.class_count {
            return Err(DetectError::InvalidInput(format!(
                "label table holds {} entries, decoder expects {} classes",
                labels.len(),
                config.class_count
            )));
        }
        Ok(Self { config, labels })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode one raw output tensor of shape (1, rows, cols, depth) into
    /// candidate boxes in detector input pixel space.
    pub fn decode(&self, output: &Array<f32, IxDyn>) -> Result<Vec<DetectedBox>, DetectError> {
        self.check_shape(output)?;

        let cfg = &self.config;
        let threshold = cfg.confidence_threshold;
        let mut boxes = Vec::new();
        let mut logits = vec![0.0f32; cfg.class_count];

        for row in 0..cfg.grid_rows {
            for col in 0..cfg.grid_cols {
                for b in 0..cfg.boxes_per_cell {
                    let channel = b * (cfg.class_count + BOX_INFO_FEATURES);

                    // cheap reject on objectness before touching the class block
                    let confidence = sigmoid(output[[0, row, col, channel + 4]]);
                    if confidence < threshold {
                        continue;
                    }

                    for (c, logit) in logits.iter_mut().enumerate() {
                        *logit = output[[0, row, col, channel + BOX_INFO_FEATURES + c]];
                    }
                    let probabilities = softmax(&logits);
                    let (top_index, top_score) = argmax(&probabilities);

                    let final_score = top_score * confidence;
                    if final_score < threshold {
                        continue;
                    }

                    let tx = output[[0, row, col, channel]];
                    let ty = output[[0, row, col, channel + 1]];
                    let tw = output[[0, row, col, channel + 2]];
                    let th = output[[0, row, col, channel + 3]];

                    let center_x = (col as f32 + sigmoid(tx)) * cfg.cell_width;
                    let center_y = (row as f32 + sigmoid(ty)) * cfg.cell_height;
                    let box_width = tw.exp() * cfg.cell_width * cfg.anchors[2 * b];
                    let box_height = th.exp() * cfg.cell_height * cfg.anchors[2 * b + 1];

                    boxes.push(DetectedBox::new(
                        Dimensions {
                            x: center_x - box_width / 2.0,
                            y: center_y - box_height / 2.0,
                            width: box_width,
                            height: box_height,
                        },
                        self.labels.names()[top_index].as_str(),
                        final_score,
                    ));
                }
            }
        }
        Ok(boxes)
    }

    fn check_shape(&self, output: &Array<f32, IxDyn>) -> Result<(), DetectError> {
        let cfg = &self.config;
        let expected = [1, cfg.grid_rows, cfg.grid_cols, cfg.channel_depth()];
        if output.shape() != expected {
            return Err(DetectError::InvalidInput(format!(
                "output tensor shape {:?} does not match expected {:?}",
                output.shape(),
                expected
            )));
        }
        Ok(())
    }
}

/// Logistic activation.
fn sigmoid(value: f32) -> f32 {
    let k = value.exp();
    k / (1.0 + k)
}

/// Max-subtracted softmax.
fn softmax(values: &[f32]) -> Vec<f32> {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.into_iter().map(|v| v / sum).collect()
}

/// Index and value of the largest element; the first maximum wins ties.
fn argmax(values: &[f32]) -> (usize, f32) {
    let mut best = (0, values[0]);
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > best.1 {
            best = (i, v);
        }
    }
    best
}
