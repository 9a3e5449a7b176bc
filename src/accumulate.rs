//! Cross-frame accumulation of detections.
//!
//! Each detection cycle produces a fresh list of boxes; the accumulator
//! merges them into one deduplicated set and watches for that set to stop
//! changing. Once enough consecutive frames leave the set untouched,
//! localization is declared complete and further merges are ignored until
//! a reset.

use log::debug;

use crate::types::{DetectedBox, ViewTransform};

/// An incoming confidence must beat the existing entry by more than this
/// to replace it; ties and near-ties keep the existing box.
pub const REPLACEMENT_MARGIN: f32 = 0.05;

/// Consecutive unchanged frames required before localization completes.
pub const STABLE_FRAME_LIMIT: u32 = 50;

/// How much state a reset clears.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetMode {
    /// Clear accumulated state and ask downstream collaborators to drop
    /// their placed anchors as well.
    Full,
    /// Clear accumulated state but leave already placed anchors alone;
    /// used when restarting detection in an already anchored scene.
    KeepAnchors,
}

/// Cumulative, deduplicated detection set with a stability latch.
///
/// Two boxes count as the same object when, after mapping to screen space
/// through the session's [`ViewTransform`], the center of either lies
/// strictly inside the other's rectangle. That containment heuristic is
/// deliberately tolerant of partial overlap between frames.
pub struct Accumulator {
    view: ViewTransform,
    replacement_margin: f32,
    stable_frame_limit: u32,
    boxes: Vec<DetectedBox>,
    stable_frames: u32,
    complete: bool,
}

impl Accumulator {
    pub fn new(view: ViewTransform) -> Self {
        Self::with_tuning(view, REPLACEMENT_MARGIN, STABLE_FRAME_LIMIT)
    }

    pub fn with_tuning(
        view: ViewTransform,
        replacement_margin: f32,
        stable_frame_limit: u32,
    ) -> Self {
        Self {
            view,
            replacement_margin,
            stable_frame_limit,
            boxes: Vec::new(),
            stable_frames: 0,
            complete: false,
        }
    }

    /// The accumulated set, ordered by descending confidence.
    pub fn boxes(&self) -> &[DetectedBox] {
        &self.boxes
    }

    /// The screen mapping the same-object predicate runs in.
    pub fn view(&self) -> ViewTransform {
        self.view
    }

    /// Frames elapsed since the set last changed.
    pub fn stable_frames(&self) -> u32 {
        self.stable_frames
    }

    pub fn localization_complete(&self) -> bool {
        self.complete
    }

    /// Declare localization complete without waiting for stability.
    pub fn force_complete(&mut self) {
        self.complete = true;
    }

    /// Flag a box as consumed by the anchor-placement collaborator.
    /// Returns `false` when `index` is out of range. This is the only
    /// mutation of accumulated boxes available to external callers.
    pub fn mark_consumed(&mut self, index: usize) -> bool {
        match self.boxes.get_mut(index) {
            Some(b) => {
                b.consumed = true;
                true
            }
            None => false,
        }
    }

    /// Clear accumulated state and the completion latch. Returns `true`
    /// when the caller must clear downstream anchors as well.
    #[must_use]
    pub fn reset(&mut self, mode: ResetMode) -> bool {
        self.boxes.clear();
        self.stable_frames = 0;
        self.complete = false;
        mode == ResetMode::Full
    }

    /// Merge one frame's boxes into the cumulative set.
    ///
    /// Total over any well-formed input, including an empty frame (which
    /// counts as an unchanged frame). Ignored once localization is
    /// complete: callers are expected to check the flag before scheduling
    /// further frames, and a cycle finishing late must not disturb the
    /// settled set.
    pub fn merge(&mut self, frame: Vec<DetectedBox>) {
        if self.complete {
            debug!("merge ignored, localization already complete");
            return;
        }

        let mut changed = false;
        for incoming in frame {
            match self.find_match(&incoming) {
                None => {
                    self.boxes.push(incoming);
                    changed = true;
                }
                Some(index) => {
                    if incoming.confidence > self.boxes[index].confidence + self.replacement_margin
                    {
                        self.boxes[index] = incoming;
                        changed = true;
                    }
                    // otherwise the existing entry wins
                }
            }
        }

        // an unchanged set is already consolidated, nothing new can collapse
        if changed {
            self.consolidate();
            self.stable_frames = 0;
        } else {
            self.stable_frames += 1;
            if self.stable_frames > self.stable_frame_limit {
                debug!(
                    "set of {} boxes stable for {} frames, localization complete",
                    self.boxes.len(),
                    self.stable_frames
                );
                self.complete = true;
            }
        }
    }

    fn find_match(&self, incoming: &DetectedBox) -> Option<usize> {
        self.boxes
            .iter()
            .position(|existing| self.same_object(incoming, existing))
    }

    /// Collapse cumulative entries that match each other, keeping the
    /// highest-confidence member of every match chain. The first pass can
    /// admit two mutually matching boxes when the match relation is not
    /// transitive (a replacement may move a box onto a neighbor it never
    /// got compared against). Scanning in descending confidence order
    /// makes the outcome independent of insertion order.
    fn consolidate(&mut self) {
        if self.boxes.len() < 2 {
            return;
        }
        let mut entries = std::mem::take(&mut self.boxes);
        entries.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut kept: Vec<DetectedBox> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !kept.iter().any(|k| self.same_object(k, &entry)) {
                kept.push(entry);
            }
        }
        self.boxes = kept;
    }

    fn same_object(&self, a: &DetectedBox, b: &DetectedBox) -> bool {
        let ra = self.view.apply(&a.dimensions);
        let rb = self.view.apply(&b.dimensions);
        let (acx, acy) = ra.center();
        let (bcx, bcy) = rb.center();
        rb.contains(acx, acy) || ra.contains(bcx, bcy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dimensions;

    fn boxed(x: f32, y: f32, w: f32, h: f32, confidence: f32, label: &str) -> DetectedBox {
        DetectedBox::new(Dimensions::new(x, y, w, h), label, confidence)
    }

    fn accumulator() -> Accumulator {
        Accumulator::new(ViewTransform::identity())
    }

    #[test]
    fn test_empty_merge_is_an_unchanged_frame() {
        let mut acc = accumulator();
        acc.merge(vec![boxed(0.0, 0.0, 10.0, 10.0, 0.5, "a")]);
        assert_eq!(acc.stable_frames(), 0);
        acc.merge(Vec::new());
        acc.merge(Vec::new());
        assert_eq!(acc.boxes().len(), 1);
        assert_eq!(acc.stable_frames(), 2);
    }

    #[test]
    fn test_stability_threshold_boundary() {
        let mut acc = accumulator();
        acc.merge(vec![boxed(0.0, 0.0, 10.0, 10.0, 0.5, "a")]);

        for _ in 0..50 {
            acc.merge(vec![boxed(0.0, 0.0, 10.0, 10.0, 0.5, "a")]);
        }
        assert_eq!(acc.stable_frames(), 50);
        assert!(!acc.localization_complete());

        acc.merge(vec![boxed(0.0, 0.0, 10.0, 10.0, 0.5, "a")]);
        assert!(acc.localization_complete());
    }

    #[test]
    fn test_replacement_needs_more_than_margin() {
        let mut acc = accumulator();
        acc.merge(vec![boxed(0.0, 0.0, 10.0, 10.0, 0.5, "old")]);

        // exactly at the margin keeps the existing entry
        acc.merge(vec![boxed(1.0, 1.0, 10.0, 10.0, 0.55, "at-margin")]);
        assert_eq!(acc.boxes()[0].label, "old");
        assert_eq!(acc.stable_frames(), 1);

        acc.merge(vec![boxed(1.0, 1.0, 10.0, 10.0, 0.561, "better")]);
        assert_eq!(acc.boxes().len(), 1);
        assert_eq!(acc.boxes()[0].label, "better");
        assert_eq!(acc.stable_frames(), 0);
    }

    #[test]
    fn test_distinct_objects_accumulate() {
        let mut acc = accumulator();
        acc.merge(vec![boxed(0.0, 0.0, 10.0, 10.0, 0.6, "a")]);
        acc.merge(vec![boxed(50.0, 50.0, 10.0, 10.0, 0.7, "b")]);
        assert_eq!(acc.boxes().len(), 2);
        assert_eq!(acc.stable_frames(), 0);
    }

    #[test]
    fn test_same_object_is_mutual_center_containment() {
        let acc = accumulator();
        // small box center sits inside the big box
        let big = boxed(0.0, 0.0, 100.0, 100.0, 0.5, "big");
        let small = boxed(40.0, 40.0, 10.0, 10.0, 0.5, "small");
        assert!(acc.same_object(&big, &small));
        assert!(acc.same_object(&small, &big));

        let far = boxed(200.0, 200.0, 10.0, 10.0, 0.5, "far");
        assert!(!acc.same_object(&big, &far));
    }

    #[test]
    fn test_consolidation_collapses_non_transitive_chain() {
        let mut acc = accumulator();
        // a and b are not the same object
        acc.merge(vec![boxed(0.0, 0.0, 10.0, 10.0, 0.5, "a")]);
        acc.merge(vec![boxed(6.0, 0.0, 10.0, 10.0, 0.55, "b")]);
        assert_eq!(acc.boxes().len(), 2);

        // c matches both; it replaces one and then absorbs the other
        acc.merge(vec![boxed(4.0, 0.0, 10.0, 10.0, 0.9, "c")]);
        assert_eq!(acc.boxes().len(), 1);
        assert_eq!(acc.boxes()[0].label, "c");
    }

    #[test]
    fn test_complete_latch_ignores_merges_until_reset() {
        let mut acc = accumulator();
        acc.force_complete();
        acc.merge(vec![boxed(0.0, 0.0, 10.0, 10.0, 0.9, "late")]);
        assert!(acc.boxes().is_empty());

        assert!(!acc.reset(ResetMode::KeepAnchors));
        assert!(!acc.localization_complete());
        acc.merge(vec![boxed(0.0, 0.0, 10.0, 10.0, 0.9, "late")]);
        assert_eq!(acc.boxes().len(), 1);
    }

    #[test]
    fn test_reset_modes() {
        let mut acc = accumulator();
        acc.merge(vec![boxed(0.0, 0.0, 10.0, 10.0, 0.5, "a")]);
        acc.force_complete();

        assert!(acc.reset(ResetMode::Full));
        assert!(acc.boxes().is_empty());
        assert_eq!(acc.stable_frames(), 0);
        assert!(!acc.localization_complete());
    }

    #[test]
    fn test_mark_consumed() {
        let mut acc = accumulator();
        acc.merge(vec![boxed(0.0, 0.0, 10.0, 10.0, 0.5, "a")]);
        assert!(!acc.boxes()[0].consumed);
        assert!(acc.mark_consumed(0));
        assert!(acc.boxes()[0].consumed);
        assert!(!acc.mark_consumed(7));
    }

    #[test]
    fn test_screen_space_matching_respects_view() {
        // identical input-space boxes stay identical under any uniform
        // mapping, but the letterbox offset must not break the predicate
        let view = ViewTransform::for_screen(1080.0, 1920.0, 416);
        let mut acc = Accumulator::new(view);
        acc.merge(vec![boxed(100.0, 100.0, 40.0, 40.0, 0.5, "a")]);
        acc.merge(vec![boxed(102.0, 98.0, 40.0, 40.0, 0.5, "a")]);
        assert_eq!(acc.boxes().len(), 1);
    }
}
