//! Configuration for the decoder and the per-frame detection cycle.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DetectError;
use crate::preprocess::CropAnchor;

/// Default detector input edge length in pixels.
pub const DEFAULT_INPUT_SIZE: u32 = 416;

/// Default confidence threshold applied during decoding.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.2;

/// Anchor priors of the stock 13x13 five-box detector, width/height pairs
/// in cell units.
pub const DEFAULT_ANCHORS: [f32; 10] = [
    0.57273, 0.677385, // anchor 0
    1.87446, 2.06253, // anchor 1
    3.33843, 5.47434, // anchor 2
    7.88282, 3.52778, // anchor 3
    9.77052, 9.16828, // anchor 4
];

/// Geometry and thresholds of the grid decoder.
///
/// Everything here is data, not algorithm: a differently shaped model is
/// served by a different config, not different code.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub grid_rows: usize,
    pub grid_cols: usize,
    pub boxes_per_cell: usize,
    /// Pixel span of one grid cell in the detector input image.
    pub cell_width: f32,
    pub cell_height: f32,
    pub class_count: usize,
    /// Width/height priors, one pair per box slot.
    pub anchors: Vec<f32>,
    pub confidence_threshold: f32,
}

impl DecoderConfig {
    /// Stock configuration: 13x13 grid of 32x32 cells, 5 anchor boxes.
    pub fn with_classes(class_count: usize) -> Self {
        Self {
            grid_rows: 13,
            grid_cols: 13,
            boxes_per_cell: 5,
            cell_width: 32.0,
            cell_height: 32.0,
            class_count,
            anchors: DEFAULT_ANCHORS.to_vec(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    /// Channel depth of one grid cell: boxes * (5 + classes).
    pub fn channel_depth(&self) -> usize {
        self.boxes_per_cell * (self.class_count + 5)
    }

    /// Load a configuration shipped as JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DetectError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            DetectError::InvalidInput(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            DetectError::InvalidInput(format!("malformed config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<(), DetectError> {
        if self.grid_rows == 0
            || self.grid_cols == 0
            || self.boxes_per_cell == 0
            || self.class_count == 0
        {
            return Err(DetectError::InvalidInput(
                "decoder geometry must be non-zero".into(),
            ));
        }
        if self.cell_width <= 0.0 || self.cell_height <= 0.0 {
            return Err(DetectError::InvalidInput(format!(
                "cell size {}x{} must be positive",
                self.cell_width, self.cell_height
            )));
        }
        if self.anchors.len() != 2 * self.boxes_per_cell {
            return Err(DetectError::InvalidInput(format!(
                "anchor table holds {} values, expected {}",
                self.anchors.len(),
                2 * self.boxes_per_cell
            )));
        }
        Ok(())
    }
}

/// Knobs of the per-frame detection cycle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Edge length of the square detector input.
    pub input_size: u32,
    pub crop_anchor: CropAnchor,
    /// Overlap above which non-max suppression drops the weaker box.
    pub nms_iou_threshold: f32,
    /// Hard cap on boxes surviving one frame.
    pub max_boxes_per_frame: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            crop_anchor: CropAnchor::Center,
            nms_iou_threshold: 0.2,
            max_boxes_per_frame: 5,
        }
    }
}

/// Ordered class names indexed by the decoder's argmax output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LabelTable {
    names: Vec<String>,
}

impl LabelTable {
    pub fn new(names: Vec<String>) -> Result<Self, DetectError> {
        if names.is_empty() {
            return Err(DetectError::InvalidInput("empty label table".into()));
        }
        Ok(Self { names })
    }

    /// Parse one label per line; blank lines and `\r` are tolerated.
    pub fn from_text(text: &str) -> Result<Self, DetectError> {
        let names = text
            .lines()
            .map(|line| line.trim_end_matches('\r').trim())
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        Self::new(names)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DetectError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            DetectError::InvalidInput(format!("cannot read label file {}: {e}", path.display()))
        })?;
        Self::from_text(&text)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_config() {
        let config = DecoderConfig::with_classes(100);
        assert_eq!(config.anchors.len(), 10); // 5 anchors * 2 (w,h)
        assert_eq!(config.channel_depth(), 5 * 105);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = DecoderConfig::with_classes(7);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: DecoderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.class_count, 7);
        assert_eq!(parsed.anchors, config.anchors);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_anchor_table() {
        let mut config = DecoderConfig::with_classes(10);
        config.anchors.pop();
        assert!(matches!(
            config.validate(),
            Err(DetectError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_label_table_from_text() {
        let table = LabelTable::from_text("apple\r\nbanana\n\n  \ncherry\n").unwrap();
        assert_eq!(table.names(), ["apple", "banana", "cherry"]);
        assert_eq!(table.get(1), Some("banana"));
        assert_eq!(table.get(3), None);
    }

    #[test]
    fn test_label_table_rejects_empty() {
        assert!(matches!(
            LabelTable::from_text("\n\r\n"),
            Err(DetectError::InvalidInput(_))
        ));
    }
}
