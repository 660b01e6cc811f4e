//! Application configuration management.
//!
//! Settings live in one typed `StudioConfig` behind a `parking_lot::RwLock`.
//! The capture worker never reads the global: it receives a copy of the
//! relevant section when it is spawned, and later changes travel through
//! its command channel.
//!
//! - `CaptureConfig`: device, cadence, display queue
//! - `DetectionConfig`: cascade model and detection parameters
//! - `RecordingConfig`: container, fps, output directory, still format

pub mod capture;
pub mod recording;

pub use capture::{CaptureConfig, DetectionConfig};
pub use recording::{Container, RecordingConfig, StillFormat};

use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{StudioError, StudioResult};

/// Settings file name inside the config directory.
const SETTINGS_FILE: &str = "settings.json";

/// All application settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StudioConfig {
    pub capture: CaptureConfig,
    pub detection: DetectionConfig,
    pub recording: RecordingConfig,
    /// Timer intervals for the shell.
    pub timers: TimerConfig,
    /// Directory for daily log files. None logs to stderr.
    pub log_dir: Option<PathBuf>,
}

/// Periodic UI timers, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimerConfig {
    /// Playback slider/label sync.
    pub playback_tick_ms: u64,
    /// Recording elapsed-time indicator.
    pub indicator_tick_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            playback_tick_ms: 500,
            indicator_tick_ms: 1000,
        }
    }
}

impl StudioConfig {
    /// Validate and clamp every section.
    pub fn validate(&mut self) {
        self.capture.validate();
        self.detection.validate();
        self.recording.validate();
        self.timers.playback_tick_ms = self.timers.playback_tick_ms.clamp(10, 5000);
        self.timers.indicator_tick_ms = self.timers.indicator_tick_ms.clamp(10, 5000);
    }

    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> StudioResult<Self> {
        let text = fs::read_to_string(path)?;
        let mut config: StudioConfig = serde_json::from_str(&text)?;
        config.validate();
        log::debug!("[CONFIG] Loaded settings from {}", path.display());
        Ok(config)
    }

    /// Load settings from `path` if it exists, defaults otherwise.
    ///
    /// A file that exists but cannot be read falls back to defaults. The error
    /// is handed back because this runs before logging is installed.
    pub fn load_or_default(path: &Path) -> (Self, Option<StudioError>) {
        if !path.exists() {
            return (Self::default(), None);
        }
        match Self::load(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Write settings as pretty JSON, creating the parent directory.
    pub fn save(&self, path: &Path) -> StudioResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// `<config dir>/webcam-studio/settings.json`.
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("webcam-studio")
        .join(SETTINGS_FILE)
}

lazy_static! {
    /// Global studio configuration.
    ///
    /// Thread-safe access via `parking_lot::RwLock` (non-poisoning, fast).
    pub static ref STUDIO_CONFIG: RwLock<StudioConfig> = RwLock::new(StudioConfig::default());
}

/// Snapshot of the current configuration.
pub fn get_config() -> StudioConfig {
    STUDIO_CONFIG.read().clone()
}

/// Replace the current configuration (validated first).
pub fn set_config(mut config: StudioConfig) {
    config.validate();
    log::debug!("[CONFIG] Studio config updated: {:?}", config);
    *STUDIO_CONFIG.write() = config;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);

        let mut config = StudioConfig::default();
        config.capture.device_index = 2;
        config.recording.container = Container::Gif;
        config.save(&path).unwrap();

        let loaded = StudioConfig::load(&path).unwrap();
        assert_eq!(loaded.capture.device_index, 2);
        assert_eq!(loaded.recording.container, Container::Gif);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let (config, error) = StudioConfig::load_or_default(&dir.path().join("absent.json"));
        assert_eq!(config, StudioConfig::default());
        assert!(error.is_none());
    }

    #[test]
    fn test_load_or_default_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{ not json").unwrap();
        let (config, error) = StudioConfig::load_or_default(&path);
        assert_eq!(config, StudioConfig::default());
        assert!(matches!(error, Some(StudioError::JsonError(_))));
    }

    #[test]
    fn test_load_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"capture": {"cadenceMs": 0}, "timers": {"playbackTickMs": 1}}"#)
            .unwrap();
        let config = StudioConfig::load(&path).unwrap();
        assert_eq!(config.capture.cadence_ms, 1);
        assert_eq!(config.timers.playback_tick_ms, 10);
        assert_eq!(config.timers.indicator_tick_ms, 1000);
    }

    #[test]
    fn test_global_config_roundtrip() {
        let mut config = get_config();
        config.recording.fps = 500;
        set_config(config);
        assert_eq!(get_config().recording.fps, 60);
    }
}
