//! Core value types shared across the detection pipeline.

use serde::{Deserialize, Serialize};

/// Bounding-box geometry in pixel units of the detector input image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Dimensions {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn xmax(&self) -> f32 {
        self.x + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Center point of the box.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Strict interior test; points on the edge do not count.
    pub fn contains(&self, px: f32, py: f32) -> bool {
        self.x < px && px < self.xmax() && self.y < py && py < self.ymax()
    }
}

/// One detected object in the detector's input pixel space.
#[derive(Clone, Debug)]
pub struct DetectedBox {
    pub dimensions: Dimensions,
    pub label: String,
    /// Combined objectness and class score in [0, 1].
    pub confidence: f32,
    /// Set once the anchor-placement collaborator has acted on this box.
    /// The pipeline itself only ever initializes it to `false`; see
    /// [`crate::accumulate::Accumulator::mark_consumed`].
    pub consumed: bool,
}

impl DetectedBox {
    pub fn new(dimensions: Dimensions, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            dimensions,
            label: label.into(),
            confidence,
            consumed: false,
        }
    }
}

/// Scale + offset mapping from detector input space to screen space.
///
/// The square detector input covers the smaller screen side; the larger
/// side is centered with a letterbox offset on one axis.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ViewTransform {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ViewTransform {
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    /// Fit the square detector input onto a screen of the given size.
    pub fn for_screen(screen_width: f32, screen_height: f32, input_size: u32) -> Self {
        let (smallest, offset_x, offset_y) = if screen_width < screen_height {
            (screen_width, 0.0, (screen_height - screen_width) / 2.0)
        } else {
            (screen_height, (screen_width - screen_height) / 2.0, 0.0)
        };
        Self {
            scale: smallest / input_size as f32,
            offset_x,
            offset_y,
        }
    }

    /// Map a box from detector input space to screen space.
    pub fn apply(&self, dimensions: &Dimensions) -> Dimensions {
        Dimensions {
            x: dimensions.x * self.scale + self.offset_x,
            y: dimensions.y * self.scale + self.offset_y,
            width: dimensions.width * self.scale,
            height: dimensions.height * self.scale,
        }
    }
}
