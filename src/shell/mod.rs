//! Event-loop side of the studio.
//!
//! The shell runs on the UI thread and is the only code that touches display
//! state. It turns user intents into commands for the capture loop, pulls
//! processed frames off the display queue and drives the playback and
//! recording-indicator timers. Rendering and message boxes belong to the
//! windowing layer, reached through [`Display`] and [`Notifier`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Local;

use crate::capture::{CaptureHandle, CaptureLoop, CaptureStats};
use crate::config::StudioConfig;
use crate::detect::FaceDetector;
use crate::error::{OptionExt, StudioError, StudioResult};
use crate::filter::Filter;
use crate::frame::Frame;
use crate::indicator::RecordingIndicator;
use crate::playback::{ClipClock, PlaybackController};
use crate::processor::FrameProcessor;
use crate::recording::{clip_path, timestamped_name, RecordingSummary};
use crate::source::FrameSource;

pub const NO_VIDEO: &str = "No video available.";

/// Surface showing the live feed and the timer-driven widgets.
pub trait Display {
    fn show_frame(&mut self, frame: &Frame);

    /// Blank the video area.
    fn clear(&mut self);

    /// Recording indicator text. Empty hides it.
    fn set_recording_label(&mut self, label: &str);

    /// Seek slider (seconds) and its `mm:ss / mm:ss` label.
    fn set_playback(&mut self, value: f64, max: f64, label: &str);
}

/// Blocking user-facing messages.
pub trait Notifier {
    fn notify(&mut self, message: &str);
}

/// Everything the user can ask for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UserIntent {
    CaptureStill,
    ToggleRecord,
    SaveVideo,
    PlayClip,
    PauseClip,
    SeekBegin,
    /// Slider dragged to this many seconds.
    SeekTo(f64),
    SeekEnd,
    ResumeCamera,
    StopCamera,
    SelectFilter(Filter),
    Close,
}

/// A timer firing every `period` once armed.
#[derive(Debug, Clone, Copy)]
struct Timer {
    period: Duration,
    next: Option<Instant>,
}

impl Timer {
    fn new(period_ms: u64) -> Self {
        Self {
            period: Duration::from_millis(period_ms),
            next: None,
        }
    }

    fn arm(&mut self, now: Instant) {
        self.next = Some(now + self.period);
    }

    fn disarm(&mut self) {
        self.next = None;
    }

    fn fire(&mut self, now: Instant) -> bool {
        match self.next {
            Some(next) if now >= next => {
                self.next = Some(now + self.period);
                true
            },
            _ => false,
        }
    }
}

pub struct Shell<D: Display, N: Notifier> {
    config: StudioConfig,
    display: D,
    notifier: N,
    capture: Option<CaptureHandle>,
    /// Source and processor while no capture loop runs.
    idle: Option<(Box<dyn FrameSource>, FrameProcessor)>,
    filter: Filter,
    recording: bool,
    last_clip: Option<RecordingSummary>,
    indicator: RecordingIndicator,
    indicator_timer: Timer,
    playback: Option<PlaybackController<ClipClock>>,
    playback_timer: Timer,
    closed: bool,
}

impl<D: Display, N: Notifier> Shell<D, N> {
    /// Open the camera and start capturing.
    ///
    /// If the camera cannot be opened the user is told once and the shell
    /// stays up without a capture loop.
    pub fn start(
        config: StudioConfig,
        source: Box<dyn FrameSource>,
        detector: Box<dyn FaceDetector>,
        display: D,
        notifier: N,
    ) -> Self {
        let processor = FrameProcessor::new(detector, config.detection.params());
        let mut shell = Self {
            indicator_timer: Timer::new(config.timers.indicator_tick_ms),
            playback_timer: Timer::new(config.timers.playback_tick_ms),
            config,
            display,
            notifier,
            capture: None,
            idle: Some((source, processor)),
            filter: Filter::default(),
            recording: false,
            last_clip: None,
            indicator: RecordingIndicator::new(),
            playback: None,
            closed: false,
        };
        shell.start_capture();
        shell
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.as_ref().is_some_and(CaptureHandle::is_running)
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn last_clip(&self) -> Option<&RecordingSummary> {
        self.last_clip.as_ref()
    }

    pub fn playback(&self) -> Option<&PlaybackController<ClipClock>> {
        self.playback.as_ref()
    }

    pub fn indicator(&self) -> &RecordingIndicator {
        &self.indicator
    }

    pub fn capture_stats(&self) -> Option<CaptureStats> {
        self.capture.as_ref().map(CaptureHandle::stats)
    }

    /// Earliest instant a timer wants [`tick`](Self::tick) called.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.indicator_timer.next, self.playback_timer.next) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn handle(&mut self, intent: UserIntent) {
        if self.closed {
            return;
        }
        log::debug!("[SHELL] {:?}", intent);
        match intent {
            UserIntent::CaptureStill => self.capture_still(),
            UserIntent::ToggleRecord => {
                if self.recording {
                    self.stop_recording();
                } else {
                    self.start_recording();
                }
            },
            UserIntent::SaveVideo => self.save_video(),
            UserIntent::PlayClip => self.play_clip(),
            UserIntent::PauseClip => {
                if let Some(playback) = self.playback.as_mut() {
                    playback.pause();
                    self.playback_timer.disarm();
                    self.show_playback();
                }
            },
            UserIntent::SeekBegin => {
                if let Some(playback) = self.playback.as_mut() {
                    playback.seek_begin();
                }
            },
            UserIntent::SeekTo(seconds) => {
                if let Some(playback) = self.playback.as_mut() {
                    playback.seek_to(seconds);
                    self.show_playback();
                }
            },
            UserIntent::SeekEnd => {
                if let Some(playback) = self.playback.as_mut() {
                    playback.seek_end();
                    self.show_playback();
                }
            },
            UserIntent::ResumeCamera => {
                if !self.is_capturing() {
                    self.stop_playback();
                    // Reclaims the source if the worker died on its own.
                    self.stop_capture();
                    self.start_capture();
                }
            },
            UserIntent::StopCamera => {
                self.stop_capture();
                self.display.clear();
            },
            UserIntent::SelectFilter(filter) => {
                self.filter = filter;
                if let Some(capture) = &self.capture {
                    if let Err(e) = capture.set_filter(filter) {
                        log::warn!("[SHELL] Filter not applied: {}", e);
                    }
                }
            },
            UserIntent::Close => self.close(),
        }
    }

    /// Present the newest processed frame, discarding older ones.
    ///
    /// Returns true if a frame was shown.
    pub fn pump_display(&mut self) -> bool {
        let Some(capture) = &self.capture else {
            return false;
        };
        match capture.display_receiver().try_iter().last() {
            Some(frame) => {
                self.display.show_frame(&frame);
                true
            },
            None => false,
        }
    }

    /// Drive the indicator and playback timers.
    pub fn tick(&mut self, now: Instant) {
        if self.indicator_timer.fire(now) {
            if let Some(label) = self.indicator.tick(now) {
                self.display.set_recording_label(label);
            }
        }
        if self.playback_timer.fire(now) {
            let Some(playback) = self.playback.as_mut() else {
                self.playback_timer.disarm();
                return;
            };
            if playback.tick() {
                self.show_playback();
            }
            if !self.playback.as_ref().is_some_and(|p| p.tick_active()) {
                self.playback_timer.disarm();
            }
        }
    }

    fn start_capture(&mut self) {
        let Some((mut source, processor)) = self.idle.take() else {
            return;
        };
        if let Err(e) = source.open() {
            log::error!("[SHELL] {}", e);
            self.notifier.notify(&e.to_string());
            self.idle = Some((source, processor));
            return;
        }
        match CaptureLoop::spawn(source, processor, self.filter, self.config.capture.clone()) {
            Ok(capture) => self.capture = Some(capture),
            Err(e) => {
                // The source went into the failed spawn and is gone.
                log::error!("[SHELL] {}", e);
                self.notifier.notify(&e.to_string());
            },
        }
    }

    /// Stop capture and wait for the worker. Finalizes an open recording.
    fn stop_capture(&mut self) {
        let Some(mut capture) = self.capture.take() else {
            return;
        };
        match capture.stop() {
            Ok(summary) => {
                if let Some(summary) = summary {
                    self.finish_recording(summary);
                }
            },
            Err(e) => log::error!("[SHELL] {}", e),
        }
        if self.recording {
            self.recording = false;
            self.indicator.stop();
            self.indicator_timer.disarm();
            self.display.set_recording_label("");
        }
        self.idle = capture.reclaim();
    }

    fn capture_still(&mut self) {
        let Some(capture) = &self.capture else {
            self.notifier.notify("Camera is not running.");
            return;
        };
        let result = capture.snapshot().and_then(|frame| {
            let frame = frame.context("no frame captured yet")?;
            let path = self.still_path();
            save_still(&frame, &path)?;
            Ok(path)
        });
        match result {
            Ok(path) => {
                log::info!("[SHELL] Still saved to {}", path.display());
                self.notifier
                    .notify(&format!("Image saved:\n{}", absolute(&path).display()));
            },
            Err(e) => {
                log::error!("[SHELL] Still capture failed: {}", e);
                self.notifier.notify(&format!("Failed to save image: {}", e));
            },
        }
    }

    fn still_path(&self) -> PathBuf {
        let recording = &self.config.recording;
        recording.output_dir.join(timestamped_name(
            "Captured",
            Local::now(),
            recording.still_format.extension(),
        ))
    }

    fn start_recording(&mut self) {
        let Some(capture) = &self.capture else {
            self.notifier.notify("Camera is not running.");
            return;
        };
        let recording = &self.config.recording;
        let path = clip_path(&recording.output_dir, Local::now(), recording.container);
        match capture.start_recording(&path, recording.container, recording.fps) {
            Ok(()) => {
                let now = Instant::now();
                self.recording = true;
                self.indicator.start(now);
                self.indicator_timer.arm(now);
                self.display.set_recording_label(self.indicator.label());
            },
            Err(e) => {
                log::error!("[SHELL] Recording not started: {}", e);
                self.notifier
                    .notify(&format!("Failed to start recording: {}", e));
            },
        }
    }

    fn stop_recording(&mut self) {
        self.recording = false;
        self.indicator.stop();
        self.indicator_timer.disarm();
        self.display.set_recording_label("");
        let Some(capture) = &self.capture else {
            return;
        };
        match capture.stop_recording() {
            Ok(summary) => self.finish_recording(summary),
            Err(e) => {
                log::error!("[SHELL] Recording not finalized: {}", e);
                self.notifier
                    .notify(&format!("Failed to finish recording: {}", e));
            },
        }
    }

    fn finish_recording(&mut self, summary: RecordingSummary) {
        log::info!(
            "[SHELL] Clip ready: {} ({} frames)",
            summary.output_path.display(),
            summary.frames_written
        );
        // A new clip replaces whatever was loaded for playback.
        self.stop_playback();
        self.playback = None;
        self.last_clip = Some(summary);
    }

    /// The last clip, if its file still exists.
    fn existing_clip(&self) -> StudioResult<&RecordingSummary> {
        let clip = self
            .last_clip
            .as_ref()
            .ok_or_else(|| StudioError::MissingFile("no clip recorded".to_string()))?;
        if !clip.output_path.is_file() {
            return Err(StudioError::MissingFile(
                clip.output_path.display().to_string(),
            ));
        }
        Ok(clip)
    }

    fn save_video(&mut self) {
        match self.existing_clip() {
            Ok(clip) => {
                let message = format!("Video saved at:\n{}", absolute(&clip.output_path).display());
                self.notifier.notify(&message);
            },
            Err(e) => {
                log::warn!("[SHELL] {}", e);
                self.notifier.notify(NO_VIDEO);
            },
        }
    }

    fn play_clip(&mut self) {
        if self.recording {
            self.stop_recording();
        }
        let clip = match self.existing_clip() {
            Ok(clip) => clip,
            Err(e) => {
                log::warn!("[SHELL] {}", e);
                self.notifier.notify(NO_VIDEO);
                return;
            },
        };
        let (path, duration) = (clip.output_path.clone(), clip.clip_duration());

        // The worker must be gone before the clip takes over the view.
        self.stop_capture();

        let reuse = self
            .playback
            .as_ref()
            .is_some_and(|p| p.media().path() == path);
        if !reuse {
            self.playback = Some(PlaybackController::new(ClipClock::new(&path, duration)));
        }
        if let Some(playback) = self.playback.as_mut() {
            playback.play();
            self.playback_timer.arm(Instant::now());
            self.show_playback();
        }
    }

    fn stop_playback(&mut self) {
        if let Some(playback) = self.playback.as_mut() {
            playback.stop();
        }
        self.playback_timer.disarm();
    }

    fn show_playback(&mut self) {
        if let Some(playback) = &self.playback {
            self.display.set_playback(
                playback.slider_value(),
                playback.slider_max(),
                playback.label(),
            );
        }
    }

    fn close(&mut self) {
        if self.recording {
            self.stop_recording();
        }
        self.stop_capture();
        self.stop_playback();
        self.closed = true;
        log::info!("[SHELL] Closed");
    }
}

impl<D: Display, N: Notifier> Drop for Shell<D, N> {
    fn drop(&mut self) {
        if !self.closed {
            self.close();
        }
    }
}

fn save_still(frame: &Frame, path: &Path) -> StudioResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    frame.save(path)
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
