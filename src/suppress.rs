//! Per-frame non-max suppression.

use std::cmp::Ordering;

use crate::types::{DetectedBox, Dimensions};

/// Intersection-over-union of two boxes.
///
/// A box with zero or negative area never matches anything and scores 0.
pub fn iou(a: &Dimensions, b: &Dimensions) -> f32 {
    let area_a = a.area();
    if area_a <= 0.0 {
        return 0.0;
    }
    let area_b = b.area();
    if area_b <= 0.0 {
        return 0.0;
    }

    let min_x = a.x.max(b.x);
    let min_y = a.y.max(b.y);
    let max_x = a.xmax().min(b.xmax());
    let max_y = a.ymax().min(b.ymax());

    let intersection = (max_x - min_x).max(0.0) * (max_y - min_y).max(0.0);
    intersection / (area_a + area_b - intersection)
}

/// Keep the highest-confidence boxes, dropping every box that overlaps an
/// already accepted one by more than `iou_threshold`. At most `limit`
/// boxes are returned. The sort is stable, so boxes with equal confidence
/// keep their emission order and the first emitted wins.
pub fn non_max_suppression(
    boxes: Vec<DetectedBox>,
    iou_threshold: f32,
    limit: usize,
) -> Vec<DetectedBox> {
    if boxes.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut sorted = boxes;
    sorted.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut active = vec![true; sorted.len()];
    let mut results = Vec::new();

    for i in 0..sorted.len() {
        if !active[i] {
            continue;
        }
        results.push(sorted[i].clone());
        if results.len() >= limit {
            break;
        }
        for j in (i + 1)..sorted.len() {
            if active[j] && iou(&sorted[i].dimensions, &sorted[j].dimensions) > iou_threshold {
                active[j] = false;
            }
        }
    }
    results
}
