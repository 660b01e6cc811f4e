//! Animated GIF clips, encoded in-process with the `gif` crate.
//!
//! Frames are streamed straight to the file; nothing is buffered beyond the
//! frame being quantized.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use gif::{Encoder, Repeat};

use super::VideoEncoder;
use crate::error::{StudioError, StudioResult};
use crate::frame::{Frame, PixelFormat};

/// NeuQuant speed (1 = best quality, 30 = fastest).
const QUANTIZE_SPEED: i32 = 10;

pub struct GifClipEncoder {
    encoder: Encoder<BufWriter<File>>,
    output_path: PathBuf,
    frame_size: (u32, u32),
    /// Frame delay in hundredths of a second.
    delay: u16,
}

impl GifClipEncoder {
    pub fn new(output_path: &Path, frame_size: (u32, u32), fps: u32) -> StudioResult<Self> {
        let (width, height) = match (u16::try_from(frame_size.0), u16::try_from(frame_size.1)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(StudioError::EncoderError(format!(
                    "{}x{} is too large for a GIF",
                    frame_size.0, frame_size.1
                )))
            },
        };
        let file = File::create(output_path).map_err(|e| {
            StudioError::EncoderError(format!(
                "Cannot create {}: {}",
                output_path.display(),
                e
            ))
        })?;
        let mut encoder = Encoder::new(BufWriter::new(file), width, height, &[])
            .map_err(|e| StudioError::EncoderError(e.to_string()))?;
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| StudioError::EncoderError(e.to_string()))?;
        log::info!(
            "[GIF] Encoding {}x{} @ {} fps -> {}",
            frame_size.0,
            frame_size.1,
            fps,
            output_path.display()
        );
        Ok(Self {
            encoder,
            output_path: output_path.to_path_buf(),
            frame_size,
            delay: (100.0 / fps.max(1) as f32).round().max(1.0) as u16,
        })
    }
}

fn to_rgba(frame: &Frame) -> Option<Vec<u8>> {
    let mut rgba = Vec::with_capacity(frame.width as usize * frame.height as usize * 4);
    match frame.format {
        PixelFormat::Bgr8 => {
            for px in frame.data.chunks_exact(3) {
                rgba.extend_from_slice(&[px[2], px[1], px[0], 255]);
            }
        },
        PixelFormat::Bgra8 => {
            for px in frame.data.chunks_exact(4) {
                rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        },
    }
    let expected = frame.width as usize * frame.height as usize * 4;
    (rgba.len() == expected).then_some(rgba)
}

impl VideoEncoder for GifClipEncoder {
    fn write_frame(&mut self, frame: &Frame) -> StudioResult<()> {
        if frame.size() != self.frame_size {
            return Err(StudioError::EncoderError(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width, frame.height, self.frame_size.0, self.frame_size.1
            )));
        }
        let mut rgba = to_rgba(frame)
            .ok_or_else(|| StudioError::InvalidFrame("buffer shorter than geometry".to_string()))?;
        // Sizes were checked against u16 in new().
        let mut gif_frame = gif::Frame::from_rgba_speed(
            frame.width as u16,
            frame.height as u16,
            &mut rgba,
            QUANTIZE_SPEED,
        );
        gif_frame.delay = self.delay;
        self.encoder
            .write_frame(&gif_frame)
            .map_err(|e| StudioError::EncoderError(e.to_string()))
    }

    fn finish(self: Box<Self>) -> StudioResult<()> {
        let GifClipEncoder {
            encoder,
            output_path,
            ..
        } = *self;
        let write_err = |e: std::io::Error| {
            StudioError::EncoderError(format!("Cannot finish {}: {}", output_path.display(), e))
        };
        // Writes the trailer.
        let mut writer = encoder.into_inner().map_err(write_err)?;
        writer.flush().map_err(write_err)?;
        writer
            .into_inner()
            .map_err(|e| write_err(e.into_error()))?
            .sync_all()
            .map_err(write_err)?;
        log::debug!("[GIF] Finished {}", output_path.display());
        Ok(())
    }
}
