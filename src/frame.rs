//! In-memory camera frames.
//!
//! Frames are tightly packed, row-major BGR or BGRA buffers. Cloning a frame
//! copies its pixels, so clones handed to the recorder or the display share
//! no mutable state with the capture worker.

use std::path::Path;

use image::{ColorType, GrayImage};
use serde::{Deserialize, Serialize};

use crate::error::{StudioError, StudioResult};

/// BT.601 luma weights, applied as `R, G, B`.
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// Channel layout of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PixelFormat {
    /// 3 bytes per pixel: blue, green, red.
    Bgr8,
    /// 4 bytes per pixel: blue, green, red, alpha.
    Bgra8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Bgr8 => 3,
            PixelFormat::Bgra8 => 4,
        }
    }
}

/// A single decoded image from the camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Channel layout of `data`.
    pub format: PixelFormat,
    /// Row-major pixel data, `width * height * channels` bytes.
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a black frame.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let len = width as usize * height as usize * format.channels();
        let mut data = vec![0u8; len];
        if format == PixelFormat::Bgra8 {
            for px in data.chunks_exact_mut(4) {
                px[3] = 255;
            }
        }
        Self {
            width,
            height,
            format,
            data,
        }
    }

    /// Wrap an existing buffer, checking that its length matches the geometry.
    pub fn from_raw(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> StudioResult<Self> {
        let expected = width as usize * height as usize * format.channels();
        if data.len() != expected {
            return Err(StudioError::InvalidFrame(format!(
                "{}x{} {:?} needs {} bytes, got {}",
                width,
                height,
                format,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Build a BGR frame from packed RGB bytes (the layout most decoders emit).
    pub fn from_rgb(width: u32, height: u32, rgb: &[u8]) -> StudioResult<Self> {
        let mut data = Vec::with_capacity(rgb.len());
        for px in rgb.chunks_exact(3) {
            data.extend_from_slice(&[px[2], px[1], px[0]]);
        }
        Self::from_raw(width, height, PixelFormat::Bgr8, data)
    }

    /// Bytes per pixel.
    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    /// `(width, height)` of the frame.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True when the frame carries no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    /// Pixel bytes at `(x, y)` in the frame's channel order.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let ch = self.channels();
        let start = (y as usize * self.width as usize + x as usize) * ch;
        &self.data[start..start + ch]
    }

    /// Mutable pixel bytes at `(x, y)`.
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let ch = self.channels();
        let start = (y as usize * self.width as usize + x as usize) * ch;
        &mut self.data[start..start + ch]
    }

    /// Mirror the frame horizontally (flip left-right) in place.
    pub fn mirror_horizontal(&mut self) {
        let ch = self.channels();
        let width = self.width as usize;
        let row_size = width * ch;
        if row_size == 0 {
            return;
        }
        for row in self.data.chunks_exact_mut(row_size) {
            for x in 0..width / 2 {
                let left = x * ch;
                let right = (width - 1 - x) * ch;
                for i in 0..ch {
                    row.swap(left + i, right + i);
                }
            }
        }
    }

    /// Single-channel luminance copy of the frame.
    pub fn to_luma(&self) -> GrayImage {
        let ch = self.channels();
        let luma: Vec<u8> = self.data.chunks_exact(ch).map(luma_of).collect();
        // Length is width * height by construction.
        GrayImage::from_raw(self.width, self.height, luma)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }

    /// Convert to packed RGB(A) bytes, the channel order `image` encoders expect.
    pub fn to_rgb_bytes(&self) -> (Vec<u8>, ColorType) {
        let mut out = self.data.clone();
        let ch = self.channels();
        for px in out.chunks_exact_mut(ch) {
            px.swap(0, 2);
        }
        let color = match self.format {
            PixelFormat::Bgr8 => ColorType::Rgb8,
            PixelFormat::Bgra8 => ColorType::Rgba8,
        };
        (out, color)
    }

    /// Save as a still image; the format follows the file extension.
    pub fn save(&self, path: &Path) -> StudioResult<()> {
        let (rgb, color) = self.to_rgb_bytes();
        // JPEG has no alpha channel.
        let is_jpeg = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
            .unwrap_or(false);
        if is_jpeg && color == ColorType::Rgba8 {
            let rgb: Vec<u8> = rgb
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            image::save_buffer(path, &rgb, self.width, self.height, ColorType::Rgb8)?;
        } else {
            image::save_buffer(path, &rgb, self.width, self.height, color)?;
        }
        Ok(())
    }
}

/// Luma of one BGR(A) pixel, rounded to the nearest integer.
pub(crate) fn luma_of(px: &[u8]) -> u8 {
    let y = LUMA_R * px[2] as f32 + LUMA_G * px[1] as f32 + LUMA_B * px[0] as f32;
    y.round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_rejects_bad_length() {
        let err = Frame::from_raw(2, 2, PixelFormat::Bgr8, vec![0; 11]).unwrap_err();
        assert!(matches!(err, StudioError::InvalidFrame(_)));
        assert!(Frame::from_raw(2, 2, PixelFormat::Bgra8, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_from_rgb_swaps_channels() {
        let frame = Frame::from_rgb(1, 1, &[10, 20, 30]).unwrap();
        assert_eq!(frame.pixel(0, 0), &[30, 20, 10]);
    }

    #[test]
    fn test_mirror_horizontal() {
        // 3x1 BGR: A B C -> C B A
        let mut frame = Frame::from_raw(
            3,
            1,
            PixelFormat::Bgr8,
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9],
        )
        .unwrap();
        frame.mirror_horizontal();
        assert_eq!(frame.data, vec![7, 8, 9, 4, 5, 6, 1, 2, 3]);
    }

    #[test]
    fn test_mirror_bgra_rows_independent() {
        let mut frame = Frame::from_raw(
            2,
            2,
            PixelFormat::Bgra8,
            (0u8..16).collect(),
        )
        .unwrap();
        frame.mirror_horizontal();
        assert_eq!(
            frame.data,
            vec![4, 5, 6, 7, 0, 1, 2, 3, 12, 13, 14, 15, 8, 9, 10, 11]
        );
    }

    #[test]
    fn test_luma_weights() {
        // Pure red in BGR order.
        assert_eq!(luma_of(&[0, 0, 255]), 76);
        assert_eq!(luma_of(&[255, 255, 255]), 255);
        assert_eq!(luma_of(&[0, 0, 0]), 0);
    }

    #[test]
    fn test_new_bgra_is_opaque() {
        let frame = Frame::new(2, 1, PixelFormat::Bgra8);
        assert_eq!(frame.data, vec![0, 0, 0, 255, 0, 0, 0, 255]);
    }

    #[test]
    fn test_save_png_and_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::new(4, 4, PixelFormat::Bgra8);

        let png = dir.path().join("still.png");
        frame.save(&png).unwrap();
        assert!(std::fs::metadata(&png).unwrap().len() > 0);

        let jpg = dir.path().join("still.jpg");
        frame.save(&jpg).unwrap();
        assert!(std::fs::metadata(&jpg).unwrap().len() > 0);
    }
}
