//! Recording and output configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use crate::recording::Container;

/// Image format for still captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StillFormat {
    #[default]
    Png,
    Jpeg,
}

impl StillFormat {
    pub fn extension(self) -> &'static str {
        match self {
            StillFormat::Png => "png",
            StillFormat::Jpeg => "jpg",
        }
    }
}

/// Settings for clips and stills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordingConfig {
    /// Container/codec chosen when a recording starts.
    pub container: Container,

    /// Nominal frame rate written into the clip (1-60).
    pub fps: u32,

    /// Directory receiving clips and stills.
    pub output_dir: PathBuf,

    /// Format of still captures.
    pub still_format: StillFormat,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            container: Container::default(),
            fps: 30,
            output_dir: default_output_dir(),
            still_format: StillFormat::default(),
        }
    }
}

impl RecordingConfig {
    /// Clamp settings to acceptable ranges.
    pub fn validate(&mut self) {
        self.fps = self.fps.clamp(1, 60);
        if self.output_dir.as_os_str().is_empty() {
            self.output_dir = default_output_dir();
        }
    }
}

/// `<Videos>/WebcamStudio`, or the working directory when the platform has
/// no videos folder.
pub fn default_output_dir() -> PathBuf {
    dirs::video_dir()
        .map(|dir| dir.join("WebcamStudio"))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_clamps_fps() {
        let mut config = RecordingConfig {
            fps: 0,
            output_dir: PathBuf::new(),
            ..RecordingConfig::default()
        };
        config.validate();
        assert_eq!(config.fps, 1);
        assert!(!config.output_dir.as_os_str().is_empty());
    }

    #[test]
    fn test_still_extension() {
        assert_eq!(StillFormat::Png.extension(), "png");
        assert_eq!(StillFormat::Jpeg.extension(), "jpg");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RecordingConfig = serde_json::from_str(r#"{"fps": 24}"#).unwrap();
        assert_eq!(config.fps, 24);
        assert_eq!(config.container, Container::default());
        assert_eq!(config.still_format, StillFormat::Png);
    }
}
