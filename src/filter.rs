//! Cosmetic per-pixel filters.
//!
//! Filters are stateless: the same input frame and selection always produce
//! the same output. Each operates in place on BGR or BGRA data and never
//! touches the alpha channel.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StudioError;
use crate::frame::{luma_of, Frame};

/// Sepia mixing matrix, rows are output `R, G, B`, columns input `R, G, B`.
pub const SEPIA_MATRIX: [[f32; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

/// Warm-tone offsets in frame channel order (`B, G, R`).
pub const WARM_OFFSETS: [u8; 3] = [10, 20, 30];

/// Filter applied to every live frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    #[default]
    None,
    BlackAndWhite,
    Sepia,
    WarmTone,
}

impl Filter {
    /// All selectable filters, in menu order.
    pub const ALL: [Filter; 4] = [
        Filter::None,
        Filter::BlackAndWhite,
        Filter::Sepia,
        Filter::WarmTone,
    ];

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Filter::None => "None",
            Filter::BlackAndWhite => "B&W",
            Filter::Sepia => "Sepia",
            Filter::WarmTone => "Insta",
        }
    }

    /// Apply the filter to `frame` in place.
    pub fn apply(self, frame: &mut Frame) {
        match self {
            Filter::None => {},
            Filter::BlackAndWhite => black_and_white(frame),
            Filter::Sepia => sepia(frame),
            Filter::WarmTone => warm_tone(frame),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Filter {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Filter::None),
            "b&w" | "bw" | "blackandwhite" | "gray" | "grey" => Ok(Filter::BlackAndWhite),
            "sepia" => Ok(Filter::Sepia),
            "insta" | "warm" | "warmtone" => Ok(Filter::WarmTone),
            other => Err(StudioError::Other(format!("Unknown filter '{}'", other))),
        }
    }
}

/// Desaturate to luminance, then expand back to the frame's channel count.
fn black_and_white(frame: &mut Frame) {
    let ch = frame.channels();
    for px in frame.data.chunks_exact_mut(ch) {
        let y = luma_of(px);
        px[0] = y;
        px[1] = y;
        px[2] = y;
    }
}

fn sepia(frame: &mut Frame) {
    let ch = frame.channels();
    for px in frame.data.chunks_exact_mut(ch) {
        let rgb = [px[2] as f32, px[1] as f32, px[0] as f32];
        let mix = |row: &[f32; 3]| -> u8 {
            let v = row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2];
            // `as` saturates out-of-range floats.
            v.round() as u8
        };
        let r = mix(&SEPIA_MATRIX[0]);
        let g = mix(&SEPIA_MATRIX[1]);
        let b = mix(&SEPIA_MATRIX[2]);
        px[0] = b;
        px[1] = g;
        px[2] = r;
    }
}

fn warm_tone(frame: &mut Frame) {
    let ch = frame.channels();
    for px in frame.data.chunks_exact_mut(ch) {
        for (value, offset) in px.iter_mut().zip(WARM_OFFSETS) {
            *value = value.saturating_add(offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    fn sample_frame(format: PixelFormat) -> Frame {
        let mut frame = Frame::new(8, 4, format);
        for y in 0..4 {
            for x in 0..8 {
                let px = frame.pixel_mut(x, y);
                px[0] = (x * 31) as u8;
                px[1] = (y * 60 + x) as u8;
                px[2] = 255 - (x * 17) as u8;
            }
        }
        frame
    }

    #[test]
    fn test_filters_are_deterministic() {
        for format in [PixelFormat::Bgr8, PixelFormat::Bgra8] {
            for filter in Filter::ALL {
                let mut a = sample_frame(format);
                let mut b = sample_frame(format);
                filter.apply(&mut a);
                filter.apply(&mut b);
                assert_eq!(a, b, "{} not deterministic", filter);
            }
        }
    }

    #[test]
    fn test_none_is_identity() {
        let original = sample_frame(PixelFormat::Bgr8);
        let mut frame = original.clone();
        Filter::None.apply(&mut frame);
        assert_eq!(frame, original);
    }

    #[test]
    fn test_black_and_white_is_gray() {
        let mut frame = sample_frame(PixelFormat::Bgra8);
        Filter::BlackAndWhite.apply(&mut frame);
        for px in frame.data.chunks_exact(4) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
            assert_eq!(px[3], 255, "alpha must survive");
        }
    }

    #[test]
    fn test_sepia_known_pixel() {
        // R=100, G=50, B=20 stored as BGR.
        let mut frame = Frame::from_raw(1, 1, PixelFormat::Bgr8, vec![20, 50, 100]).unwrap();
        Filter::Sepia.apply(&mut frame);
        // R' = 39.3 + 38.45 + 3.78 = 81.53
        // G' = 34.9 + 34.3 + 3.36 = 72.56
        // B' = 27.2 + 26.7 + 2.62 = 56.52
        assert_eq!(frame.pixel(0, 0), &[57, 73, 82]);
    }

    #[test]
    fn test_sepia_saturates_white() {
        let mut frame = Frame::from_raw(1, 1, PixelFormat::Bgr8, vec![255, 255, 255]).unwrap();
        Filter::Sepia.apply(&mut frame);
        // Red and green rows sum above 1.0 and clamp.
        assert_eq!(frame.pixel(0, 0)[2], 255);
        assert_eq!(frame.pixel(0, 0)[1], 255);
        // Blue row sums to 0.937.
        assert_eq!(frame.pixel(0, 0)[0], 239);
    }

    #[test]
    fn test_warm_tone_offsets() {
        let mut frame = Frame::from_raw(1, 1, PixelFormat::Bgr8, vec![0, 0, 0]).unwrap();
        Filter::WarmTone.apply(&mut frame);
        assert_eq!(frame.pixel(0, 0), &[10, 20, 30]);
    }

    #[test]
    fn test_warm_tone_saturates() {
        let mut frame =
            Frame::from_raw(1, 1, PixelFormat::Bgra8, vec![250, 240, 230, 128]).unwrap();
        Filter::WarmTone.apply(&mut frame);
        assert_eq!(frame.pixel(0, 0), &[255, 255, 255, 128]);
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!("B&W".parse::<Filter>().unwrap(), Filter::BlackAndWhite);
        assert_eq!("insta".parse::<Filter>().unwrap(), Filter::WarmTone);
        assert_eq!(" Sepia ".parse::<Filter>().unwrap(), Filter::Sepia);
        assert!("vintage".parse::<Filter>().is_err());
        for filter in Filter::ALL {
            assert_eq!(filter.label().parse::<Filter>().unwrap(), filter);
        }
    }
}
