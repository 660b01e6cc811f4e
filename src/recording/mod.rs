//! Recording sink: an encoder bound to a file path.
//!
//! The sink is owned by the capture worker. At most one session is open at
//! a time, and the open session *is* the encoder, so "recording" and "has an
//! open encoder" cannot disagree.

mod ffmpeg;
mod gif;

pub use self::ffmpeg::{check_encoder, find_ffmpeg, FfmpegEncoder};
pub use self::gif::GifClipEncoder;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{StudioError, StudioResult};
use crate::frame::Frame;

/// Container/codec pair for recorded clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Container {
    /// H.264 in MP4, encoded by an ffmpeg child process.
    #[default]
    Mp4,
    /// Animated GIF, encoded in-process.
    Gif,
}

impl Container {
    pub fn extension(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Gif => "gif",
        }
    }
}

/// Destination for encoded frames.
pub trait VideoEncoder: Send {
    /// Encode one frame. Frames must match the size the encoder was opened with.
    fn write_frame(&mut self, frame: &Frame) -> StudioResult<()>;

    /// Flush and close the output file.
    fn finish(self: Box<Self>) -> StudioResult<()>;
}

/// Open the encoder for `container`. Fails if the output cannot be opened.
pub fn open_encoder(
    container: Container,
    path: &Path,
    frame_size: (u32, u32),
    fps: u32,
) -> StudioResult<Box<dyn VideoEncoder>> {
    match container {
        Container::Mp4 => Ok(Box::new(FfmpegEncoder::new(path, frame_size, fps)?)),
        Container::Gif => Ok(Box::new(GifClipEncoder::new(path, frame_size, fps)?)),
    }
}

/// `<prefix>_YYYYMMDD_HHMMSS.<extension>`.
pub fn timestamped_name(prefix: &str, at: DateTime<Local>, extension: &str) -> String {
    format!("{}_{}.{}", prefix, at.format("%Y%m%d_%H%M%S"), extension)
}

/// Path for a clip started at `at`.
pub fn clip_path(dir: &Path, at: DateTime<Local>, container: Container) -> PathBuf {
    dir.join(timestamped_name("Video", at, container.extension()))
}

/// An open recording.
pub struct RecordingSession {
    pub output_path: PathBuf,
    pub container: Container,
    pub started_at: DateTime<Local>,
    pub frame_size: (u32, u32),
    pub fps: u32,
    pub frames_written: u64,
    started: Instant,
    encoder: Box<dyn VideoEncoder>,
}

/// What a finished recording produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    pub output_path: PathBuf,
    pub container: Container,
    pub started_at: DateTime<Local>,
    pub frame_size: (u32, u32),
    pub fps: u32,
    pub frames_written: u64,
    /// Wall-clock time the session was open.
    pub wall_time: Duration,
}

impl RecordingSummary {
    /// Playback length of the clip: frames at the nominal rate.
    pub fn clip_duration(&self) -> Duration {
        if self.fps == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames_written as f64 / self.fps as f64)
    }
}

/// Single-session recorder.
#[derive(Default)]
pub struct RecordingSink {
    session: Option<RecordingSession>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    /// Open an encoder for `container` at `path` and begin a session.
    pub fn start(
        &mut self,
        path: &Path,
        container: Container,
        frame_size: (u32, u32),
        fps: u32,
    ) -> StudioResult<()> {
        if self.session.is_some() {
            return Err(StudioError::AlreadyRecording);
        }
        if frame_size.0 == 0 || frame_size.1 == 0 {
            return Err(StudioError::EncoderError(
                "frame size is unknown; no frame captured yet".to_string(),
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let encoder = open_encoder(container, path, frame_size, fps)?;
        self.start_with_encoder(path, container, frame_size, fps, encoder)
    }

    /// Begin a session on an already opened encoder.
    pub fn start_with_encoder(
        &mut self,
        path: &Path,
        container: Container,
        frame_size: (u32, u32),
        fps: u32,
        encoder: Box<dyn VideoEncoder>,
    ) -> StudioResult<()> {
        if self.session.is_some() {
            return Err(StudioError::AlreadyRecording);
        }
        log::info!(
            "[RECORDING] Started {:?} {}x{} @ {} fps -> {}",
            container,
            frame_size.0,
            frame_size.1,
            fps,
            path.display()
        );
        self.session = Some(RecordingSession {
            output_path: path.to_path_buf(),
            container,
            started_at: Local::now(),
            frame_size,
            fps,
            frames_written: 0,
            started: Instant::now(),
            encoder,
        });
        Ok(())
    }

    /// Encode one frame into the open session.
    pub fn write(&mut self, frame: &Frame) -> StudioResult<()> {
        let session = self
            .session
            .as_mut()
            .ok_or(StudioError::RecordingNotActive)?;
        session.encoder.write_frame(frame)?;
        session.frames_written += 1;
        Ok(())
    }

    /// Flush and release the encoder. Later writes fail with `RecordingNotActive`.
    pub fn stop(&mut self) -> StudioResult<RecordingSummary> {
        let session = self.session.take().ok_or(StudioError::RecordingNotActive)?;
        let summary = RecordingSummary {
            output_path: session.output_path,
            container: session.container,
            started_at: session.started_at,
            frame_size: session.frame_size,
            fps: session.fps,
            frames_written: session.frames_written,
            wall_time: session.started.elapsed(),
        };
        session.encoder.finish()?;
        log::info!(
            "[RECORDING] Stopped after {} frames ({:.1}s): {}",
            summary.frames_written,
            summary.wall_time.as_secs_f64(),
            summary.output_path.display()
        );
        Ok(summary)
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        if self.session.is_some() {
            if let Err(e) = self.stop() {
                log::warn!("[RECORDING] Failed to finalize recording on drop: {}", e);
            }
        }
    }
}

#[cfg(all(test, unix))]
pub(crate) mod testing;
