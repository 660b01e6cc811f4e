//! Capture and detection configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::detect::DetectParams;

/// Settings for the camera and the capture worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Camera device index. The first device is 0.
    pub device_index: usize,

    /// Sleep between capture iterations in milliseconds (~30 fps at 33).
    pub cadence_ms: u64,

    /// Frame rate requested from the device.
    pub target_fps: u32,

    /// Mirror the live preview horizontally (selfie mode).
    pub mirror: bool,

    /// Use the synthetic test pattern instead of a camera.
    pub synthetic_source: bool,

    /// Test pattern size `(width, height)`.
    pub synthetic_size: (u32, u32),

    /// Frames held between the worker and the display (1-2, oldest dropped).
    pub display_queue: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            cadence_ms: 33,
            target_fps: 30,
            mirror: true,
            synthetic_source: false,
            synthetic_size: (640, 480),
            display_queue: 2,
        }
    }
}

impl CaptureConfig {
    /// Clamp settings to acceptable ranges.
    pub fn validate(&mut self) {
        self.cadence_ms = self.cadence_ms.clamp(1, 1000);
        self.target_fps = self.target_fps.clamp(1, 120);
        self.display_queue = self.display_queue.clamp(1, 2);
        if self.synthetic_size.0 == 0 || self.synthetic_size.1 == 0 {
            self.synthetic_size = Self::default().synthetic_size;
        }
    }
}

/// Settings for the face overlay pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectionConfig {
    /// Run detection on every frame.
    pub enabled: bool,

    /// Cascade model, loaded once at startup.
    pub model_path: PathBuf,

    /// Window growth between scales.
    pub scale_factor: f32,

    /// Raw hits needed for a face to be reported.
    pub min_neighbors: u32,

    /// Smallest face considered, `(width, height)`.
    pub min_size: (u32, u32),
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let params = DetectParams::default();
        Self {
            enabled: true,
            model_path: PathBuf::from("haarcascade_frontalface_default.json"),
            scale_factor: params.scale_factor,
            min_neighbors: params.min_neighbors,
            min_size: params.min_size,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&mut self) {
        if self.scale_factor.is_nan() || self.scale_factor <= 1.0 {
            self.scale_factor = DetectParams::default().scale_factor;
        }
    }

    pub fn params(&self) -> DetectParams {
        DetectParams {
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
            min_size: self.min_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_validate_clamps() {
        let mut config = CaptureConfig {
            cadence_ms: 0,
            target_fps: 500,
            display_queue: 16,
            synthetic_size: (0, 10),
            ..CaptureConfig::default()
        };
        config.validate();
        assert_eq!(config.cadence_ms, 1);
        assert_eq!(config.target_fps, 120);
        assert_eq!(config.display_queue, 2);
        assert_eq!(config.synthetic_size, (640, 480));
    }

    #[test]
    fn test_detection_defaults_match_params() {
        let config = DetectionConfig::default();
        assert_eq!(config.params(), DetectParams::default());
    }

    #[test]
    fn test_detection_rejects_non_growing_scale() {
        let mut config = DetectionConfig {
            scale_factor: 0.9,
            ..DetectionConfig::default()
        };
        config.validate();
        assert!(config.scale_factor > 1.0);
    }
}
