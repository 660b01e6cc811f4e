//! Frame sources.
//!
//! A source is opened once on the UI thread (so a missing device can be
//! reported before any capture starts) and then moved into the capture
//! worker, which is its only reader.

#[cfg(feature = "camera")]
mod camera;
mod pattern;

#[cfg(feature = "camera")]
pub use camera::CameraSource;
pub use pattern::TestPatternSource;

use crate::config::CaptureConfig;
use crate::error::StudioResult;
use crate::frame::Frame;

/// Producer of raw camera frames.
pub trait FrameSource: Send {
    /// Acquire the device. Fails with `StudioError::DeviceUnavailable`.
    fn open(&mut self) -> StudioResult<()>;

    /// Next frame, or `None` when the device had nothing to deliver this time.
    fn read(&mut self) -> StudioResult<Option<Frame>>;

    /// Negotiated `(width, height)`; `(0, 0)` before `open`.
    fn frame_size(&self) -> (u32, u32);

    /// Release the device. Reads after `close` return `None`.
    fn close(&mut self) {}
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open(&mut self) -> StudioResult<()> {
        (**self).open()
    }

    fn read(&mut self) -> StudioResult<Option<Frame>> {
        (**self).read()
    }

    fn frame_size(&self) -> (u32, u32) {
        (**self).frame_size()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Build the source selected by the configuration. The source is not opened.
pub fn create_source(config: &CaptureConfig) -> Box<dyn FrameSource> {
    if config.synthetic_source {
        log::info!("[SOURCE] Using synthetic test pattern source");
        return Box::new(TestPatternSource::new(
            config.synthetic_size.0,
            config.synthetic_size.1,
        ));
    }
    camera_source(config)
}

#[cfg(feature = "camera")]
fn camera_source(config: &CaptureConfig) -> Box<dyn FrameSource> {
    Box::new(CameraSource::new(config.device_index, config.target_fps))
}

#[cfg(not(feature = "camera"))]
fn camera_source(config: &CaptureConfig) -> Box<dyn FrameSource> {
    Box::new(MissingCamera {
        device_index: config.device_index,
    })
}

/// Stand-in used when the binary is built without a camera backend.
#[cfg(not(feature = "camera"))]
struct MissingCamera {
    device_index: usize,
}

#[cfg(not(feature = "camera"))]
impl FrameSource for MissingCamera {
    fn open(&mut self) -> StudioResult<()> {
        Err(crate::error::StudioError::DeviceUnavailable(format!(
            "device {} (built without the `camera` feature)",
            self.device_index
        )))
    }

    fn read(&mut self) -> StudioResult<Option<Frame>> {
        Ok(None)
    }

    fn frame_size(&self) -> (u32, u32) {
        (0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_synthetic_source() {
        let config = CaptureConfig {
            synthetic_source: true,
            synthetic_size: (32, 24),
            ..CaptureConfig::default()
        };
        let mut source = create_source(&config);
        source.open().unwrap();
        assert_eq!(source.frame_size(), (32, 24));
        let frame = source.read().unwrap().unwrap();
        assert_eq!(frame.size(), (32, 24));
    }

    #[cfg(feature = "camera")]
    #[test]
    fn test_default_config_selects_camera() {
        let source = create_source(&CaptureConfig::default());
        // Not opened yet, so no geometry.
        assert_eq!(source.frame_size(), (0, 0));
    }

    #[cfg(not(feature = "camera"))]
    #[test]
    fn test_missing_camera_reports_unavailable() {
        let mut source = create_source(&CaptureConfig::default());
        let err = source.open().unwrap_err();
        assert!(matches!(
            err,
            crate::error::StudioError::DeviceUnavailable(_)
        ));
    }
}
