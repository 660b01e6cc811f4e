//! Face detection and overlay drawing.
//!
//! The capture worker runs a detector over a grayscale working copy of every
//! frame and outlines each detected region on the filtered frame.

mod group;
mod haar;

pub use group::group_rectangles;
pub use haar::{HaarCascade, HaarClassifier, HaarFeature, HaarRect, HaarStage};

use image::{GrayImage, ImageBuffer, Rgb, Rgba};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::frame::{Frame, PixelFormat};

/// Outline color for detected faces (green in both RGB and BGR order).
const BOX_COLOR: [u8; 3] = [0, 255, 0];

/// Outline thickness in pixels.
const BOX_THICKNESS: u32 = 2;

/// Axis-aligned region reported by a detector, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Multi-scale detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectParams {
    /// Window growth factor between scales.
    pub scale_factor: f32,
    /// Minimum number of overlapping raw hits for a region to be kept.
    pub min_neighbors: u32,
    /// Smallest window considered, `(width, height)`. Zero means the model window.
    pub min_size: (u32, u32),
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 6,
            min_size: (0, 0),
        }
    }
}

/// Detection backend.
///
/// Implementations may keep state between frames, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, gray: &GrayImage, params: &DetectParams) -> Vec<FaceRect>;
}

/// Detector that never reports a region. Used when detection is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDetector;

impl FaceDetector for NoopDetector {
    fn detect(&mut self, _gray: &GrayImage, _params: &DetectParams) -> Vec<FaceRect> {
        Vec::new()
    }
}

impl FaceDetector for HaarCascade {
    fn detect(&mut self, gray: &GrayImage, params: &DetectParams) -> Vec<FaceRect> {
        self.detect_multi_scale(gray, params)
    }
}

impl<D: FaceDetector + ?Sized> FaceDetector for Box<D> {
    fn detect(&mut self, gray: &GrayImage, params: &DetectParams) -> Vec<FaceRect> {
        (**self).detect(gray, params)
    }
}

/// Draw a 2-px outline around each region directly onto `frame`.
pub fn draw_face_boxes(frame: &mut Frame, faces: &[FaceRect]) {
    let (width, height) = frame.size();
    match frame.format {
        PixelFormat::Bgr8 => {
            let Some(mut canvas) =
                ImageBuffer::<Rgb<u8>, &mut [u8]>::from_raw(width, height, &mut frame.data[..])
            else {
                return;
            };
            for face in faces {
                outline(&mut canvas, face, Rgb(BOX_COLOR));
            }
        },
        PixelFormat::Bgra8 => {
            let Some(mut canvas) =
                ImageBuffer::<Rgba<u8>, &mut [u8]>::from_raw(width, height, &mut frame.data[..])
            else {
                return;
            };
            let [b, g, r] = BOX_COLOR;
            for face in faces {
                outline(&mut canvas, face, Rgba([b, g, r, 255]));
            }
        },
    }
}

fn outline<I>(canvas: &mut I, face: &FaceRect, color: I::Pixel)
where
    I: image::GenericImage,
{
    for inset in 0..BOX_THICKNESS {
        let w = face.width.saturating_sub(inset * 2);
        let h = face.height.saturating_sub(inset * 2);
        if w == 0 || h == 0 {
            break;
        }
        let rect = Rect::at((face.x + inset) as i32, (face.y + inset) as i32).of_size(w, h);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}
