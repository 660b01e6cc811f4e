//! Per-frame processing: filter, then face overlays.

use crate::detect::{draw_face_boxes, DetectParams, FaceDetector, FaceRect, NoopDetector};
use crate::filter::Filter;
use crate::frame::Frame;

/// Applies the selected filter and outlines detected faces.
///
/// Owned by the capture worker; the filter is chosen per call.
pub struct FrameProcessor {
    detector: Box<dyn FaceDetector>,
    params: DetectParams,
}

impl FrameProcessor {
    pub fn new(detector: Box<dyn FaceDetector>, params: DetectParams) -> Self {
        Self { detector, params }
    }

    /// Processor that filters only.
    pub fn without_detection() -> Self {
        Self::new(Box::new(NoopDetector), DetectParams::default())
    }

    pub fn params(&self) -> &DetectParams {
        &self.params
    }

    /// Filter `frame` in place, then draw a box around every face found in
    /// the filtered result. Returns the faces drawn.
    pub fn process(&mut self, frame: &mut Frame, filter: Filter) -> Vec<FaceRect> {
        filter.apply(frame);
        if frame.is_empty() {
            return Vec::new();
        }
        let gray = frame.to_luma();
        let faces = self.detector.detect(&gray, &self.params);
        if !faces.is_empty() {
            draw_face_boxes(frame, &faces);
        }
        faces
    }
}
