//! Synthetic frame source.

use crate::error::{StudioError, StudioResult};
use crate::frame::{Frame, PixelFormat};

/// Moving gradient with a bright square, standing in for a camera.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    opened: bool,
    frame_id: u64,
    /// Reads that come back empty before the first real frame.
    empty_reads: u32,
    /// Fail `open` as if no device were attached.
    unavailable: bool,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            opened: false,
            frame_id: 0,
            empty_reads: 0,
            unavailable: false,
        }
    }

    /// Deliver `count` empty reads before producing frames.
    pub fn with_empty_reads(mut self, count: u32) -> Self {
        self.empty_reads = count;
        self
    }

    /// Make `open` fail with `DeviceUnavailable`.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Frames produced so far.
    pub fn frames_produced(&self) -> u64 {
        self.frame_id
    }

    fn render(&self) -> Frame {
        let mut frame = Frame::new(self.width, self.height, PixelFormat::Bgr8);
        let shift = (self.frame_id * 4) as u32;
        let square = self.width.min(self.height) / 4;
        let sq_x = shift % self.width.max(1);
        for y in 0..self.height {
            for x in 0..self.width {
                let px = frame.pixel_mut(x, y);
                px[0] = ((x + shift) % 256) as u8;
                px[1] = (y % 256) as u8;
                px[2] = ((x + y) % 256) as u8;
                if x >= sq_x && x < sq_x + square && y < square {
                    px.copy_from_slice(&[255, 255, 255]);
                }
            }
        }
        frame
    }
}

impl super::FrameSource for TestPatternSource {
    fn open(&mut self) -> StudioResult<()> {
        if self.unavailable {
            return Err(StudioError::DeviceUnavailable(
                "test pattern configured as absent".to_string(),
            ));
        }
        self.opened = true;
        Ok(())
    }

    fn read(&mut self) -> StudioResult<Option<Frame>> {
        if !self.opened {
            return Ok(None);
        }
        if self.empty_reads > 0 {
            self.empty_reads -= 1;
            return Ok(None);
        }
        let frame = self.render();
        self.frame_id += 1;
        Ok(Some(frame))
    }

    fn frame_size(&self) -> (u32, u32) {
        if self.opened {
            (self.width, self.height)
        } else {
            (0, 0)
        }
    }

    fn close(&mut self) {
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FrameSource;

    #[test]
    fn test_reads_before_open_are_empty() {
        let mut source = TestPatternSource::new(8, 8);
        assert!(source.read().unwrap().is_none());
        assert_eq!(source.frame_size(), (0, 0));
    }

    #[test]
    fn test_empty_reads_then_frames() {
        let mut source = TestPatternSource::new(8, 8).with_empty_reads(2);
        source.open().unwrap();
        assert!(source.read().unwrap().is_none());
        assert!(source.read().unwrap().is_none());
        assert!(source.read().unwrap().is_some());
        assert_eq!(source.frames_produced(), 1);
    }

    #[test]
    fn test_frames_move() {
        let mut source = TestPatternSource::new(16, 16);
        source.open().unwrap();
        let a = source.read().unwrap().unwrap();
        let b = source.read().unwrap().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unavailable() {
        let mut source = TestPatternSource::new(8, 8).unavailable();
        assert!(matches!(
            source.open(),
            Err(StudioError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn test_close_stops_frames() {
        let mut source = TestPatternSource::new(8, 8);
        source.open().unwrap();
        source.close();
        assert!(source.read().unwrap().is_none());
    }
}
