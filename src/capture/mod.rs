//! Capture loop: the worker thread that owns the camera.
//!
//! Each iteration reads a frame, keeps an unprocessed copy for stills,
//! mirrors, filters and overlays it, feeds any open recording and hands a
//! copy to the display queue. Filter and recording state live on the worker;
//! other threads reach them only through [`CaptureCommand`]s.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{Receiver, Sender};
use serde::Serialize;

use crate::config::CaptureConfig;
use crate::error::{StudioError, StudioResult};
use crate::filter::Filter;
use crate::frame::Frame;
use crate::processor::FrameProcessor;
use crate::queue::{drop_oldest, DropOldestSender};
use crate::recording::{Container, RecordingSink, RecordingSummary};
use crate::source::FrameSource;

/// Log every Nth consecutive failed read after the first.
const READ_LOG_EVERY: u64 = 30;

/// Requests handled by the worker between iterations.
pub enum CaptureCommand {
    SetFilter(Filter),
    StartRecording {
        path: PathBuf,
        container: Container,
        fps: u32,
        reply: Sender<StudioResult<()>>,
    },
    StopRecording {
        reply: Sender<StudioResult<RecordingSummary>>,
    },
    /// Copy of the most recent unprocessed frame, if any.
    Snapshot {
        reply: Sender<Option<Frame>>,
    },
    Shutdown,
}

/// Shared counters, updated by the worker.
#[derive(Default)]
struct Counters {
    frames_captured: AtomicU64,
    empty_reads: AtomicU64,
    read_errors: AtomicU64,
    frames_recorded: AtomicU64,
}

/// Point-in-time view of the worker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub empty_reads: u64,
    pub read_errors: u64,
    pub frames_recorded: u64,
    /// Frames evicted from the display queue because the UI fell behind.
    pub display_dropped: u64,
}

pub struct CaptureLoop;

/// What the worker hands back when it exits.
struct WorkerExit {
    source: Box<dyn FrameSource>,
    processor: FrameProcessor,
    summary: Option<RecordingSummary>,
}

impl CaptureLoop {
    /// Start the worker on an already opened `source`. `filter` applies from
    /// the first frame.
    pub fn spawn(
        source: Box<dyn FrameSource>,
        processor: FrameProcessor,
        filter: Filter,
        config: CaptureConfig,
    ) -> StudioResult<CaptureHandle> {
        let (commands_tx, commands_rx) = flume::unbounded();
        let (display_tx, display_rx) = drop_oldest(config.display_queue);
        let should_stop = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(Counters::default());
        let display_dropped = display_tx.dropped_counter();

        let worker = Worker {
            source,
            processor,
            commands: commands_rx,
            display: display_tx,
            should_stop: Arc::clone(&should_stop),
            counters: Arc::clone(&counters),
            sink: RecordingSink::new(),
            filter,
            last_frame: None,
            mirror: config.mirror,
            cadence: Duration::from_millis(config.cadence_ms),
            consecutive_failures: 0,
        };

        let thread = thread::Builder::new()
            .name("capture-loop".to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                StudioError::CaptureError(format!("Failed to spawn capture thread: {}", e))
            })?;

        log::info!(
            "[CAPTURE] Capture loop started ({} ms cadence, filter {})",
            config.cadence_ms,
            filter
        );

        Ok(CaptureHandle {
            commands: commands_tx,
            display: display_rx,
            should_stop,
            counters,
            display_dropped,
            thread: Some(thread),
            reclaimed: None,
        })
    }
}

/// Owner-side handle of a running capture loop.
///
/// Dropping the handle stops the worker and waits for it.
pub struct CaptureHandle {
    commands: Sender<CaptureCommand>,
    display: Receiver<Frame>,
    should_stop: Arc<AtomicBool>,
    counters: Arc<Counters>,
    display_dropped: Arc<AtomicU64>,
    thread: Option<JoinHandle<WorkerExit>>,
    /// Source (closed) and processor returned by a stopped worker.
    reclaimed: Option<(Box<dyn FrameSource>, FrameProcessor)>,
}

impl CaptureHandle {
    /// Processed frames, newest last. Holds at most the configured queue size.
    pub fn display_receiver(&self) -> &Receiver<Frame> {
        &self.display
    }

    /// Select the filter for subsequent frames.
    pub fn set_filter(&self, filter: Filter) -> StudioResult<()> {
        self.commands
            .send(CaptureCommand::SetFilter(filter))
            .map_err(|_| StudioError::ChannelClosed("capture loop has stopped".to_string()))
    }

    /// Open a recording at `path`. Frames are written from the next iteration.
    pub fn start_recording(&self, path: &Path, container: Container, fps: u32) -> StudioResult<()> {
        self.request(|reply| CaptureCommand::StartRecording {
            path: path.to_path_buf(),
            container,
            fps,
            reply,
        })?
    }

    /// Finalize the open recording.
    pub fn stop_recording(&self) -> StudioResult<RecordingSummary> {
        self.request(|reply| CaptureCommand::StopRecording { reply })?
    }

    /// Most recent unprocessed frame. Capture keeps running.
    pub fn snapshot(&self) -> StudioResult<Option<Frame>> {
        self.request(|reply| CaptureCommand::Snapshot { reply })
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.counters.frames_captured.load(Ordering::Relaxed),
            empty_reads: self.counters.empty_reads.load(Ordering::Relaxed),
            read_errors: self.counters.read_errors.load(Ordering::Relaxed),
            frames_recorded: self.counters.frames_recorded.load(Ordering::Relaxed),
            display_dropped: self.display_dropped.load(Ordering::Relaxed),
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// When this returns no further frames will be produced, the source is
    /// closed and any open recording has been finalized; its summary is
    /// returned.
    pub fn stop(&mut self) -> StudioResult<Option<RecordingSummary>> {
        let Some(thread) = self.thread.take() else {
            return Ok(None);
        };
        self.should_stop.store(true, Ordering::SeqCst);
        let _ = self.commands.send(CaptureCommand::Shutdown);
        log::debug!("[CAPTURE] Stopping capture loop...");
        let exit = thread
            .join()
            .map_err(|_| StudioError::CaptureError("capture thread panicked".to_string()))?;
        log::info!("[CAPTURE] Capture loop stopped");
        self.reclaimed = Some((exit.source, exit.processor));
        Ok(exit.summary)
    }

    /// Take back the source and processor after [`stop`](Self::stop), so a
    /// new loop can be spawned on them. The source must be reopened.
    pub fn reclaim(&mut self) -> Option<(Box<dyn FrameSource>, FrameProcessor)> {
        self.reclaimed.take()
    }

    fn request<R>(&self, command: impl FnOnce(Sender<R>) -> CaptureCommand) -> StudioResult<R> {
        let (reply_tx, reply_rx) = flume::bounded(1);
        self.commands
            .send(command(reply_tx))
            .map_err(|_| StudioError::ChannelClosed("capture loop has stopped".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| StudioError::ChannelClosed("capture loop exited before replying".to_string()))
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("[CAPTURE] {}", e);
        }
    }
}

struct Worker {
    source: Box<dyn FrameSource>,
    processor: FrameProcessor,
    commands: Receiver<CaptureCommand>,
    display: DropOldestSender<Frame>,
    should_stop: Arc<AtomicBool>,
    counters: Arc<Counters>,
    sink: RecordingSink,
    filter: Filter,
    last_frame: Option<Frame>,
    mirror: bool,
    cadence: Duration,
    consecutive_failures: u64,
}

impl Worker {
    fn run(mut self) -> WorkerExit {
        while !self.should_stop.load(Ordering::SeqCst) {
            if !self.drain_commands() {
                break;
            }
            self.iterate();
            thread::sleep(self.cadence);
        }
        self.shutdown()
    }

    /// Handle queued commands. Returns false on shutdown.
    fn drain_commands(&mut self) -> bool {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                CaptureCommand::SetFilter(filter) => {
                    log::debug!("[CAPTURE] Filter -> {}", filter);
                    self.filter = filter;
                },
                CaptureCommand::StartRecording {
                    path,
                    container,
                    fps,
                    reply,
                } => {
                    let frame_size = self.frame_size();
                    let result = self.sink.start(&path, container, frame_size, fps);
                    if let Err(e) = &result {
                        log::error!("[CAPTURE] Could not start recording: {}", e);
                    }
                    let _ = reply.send(result);
                },
                CaptureCommand::StopRecording { reply } => {
                    let _ = reply.send(self.sink.stop());
                },
                CaptureCommand::Snapshot { reply } => {
                    let _ = reply.send(self.last_frame.clone());
                },
                CaptureCommand::Shutdown => return false,
            }
        }
        true
    }

    fn frame_size(&self) -> (u32, u32) {
        self.last_frame
            .as_ref()
            .map(Frame::size)
            .unwrap_or_else(|| self.source.frame_size())
    }

    fn iterate(&mut self) {
        let mut frame = match self.source.read() {
            Ok(Some(frame)) if !frame.is_empty() => frame,
            Ok(_) => {
                self.counters.empty_reads.fetch_add(1, Ordering::Relaxed);
                self.note_failure("empty frame");
                return;
            },
            Err(e) => {
                self.counters.read_errors.fetch_add(1, Ordering::Relaxed);
                self.note_failure(&e.to_string());
                return;
            },
        };
        if self.consecutive_failures > 0 {
            log::debug!(
                "[CAPTURE] Frames resumed after {} failed reads",
                self.consecutive_failures
            );
            self.consecutive_failures = 0;
        }
        self.counters.frames_captured.fetch_add(1, Ordering::Relaxed);
        self.last_frame = Some(frame.clone());

        if self.mirror {
            frame.mirror_horizontal();
        }
        self.processor.process(&mut frame, self.filter);

        if self.sink.is_recording() {
            match self.sink.write(&frame) {
                Ok(()) => {
                    self.counters.frames_recorded.fetch_add(1, Ordering::Relaxed);
                },
                Err(e) => log::warn!("[CAPTURE] Dropped frame from recording: {}", e),
            }
        }

        // Nobody watching is not an error: the shell may be between views.
        let _ = self.display.send(frame);
    }

    fn note_failure(&mut self, reason: &str) {
        self.consecutive_failures += 1;
        if self.consecutive_failures == 1 || self.consecutive_failures % READ_LOG_EVERY == 0 {
            log::warn!(
                "[CAPTURE] No frame ({}), {} in a row",
                reason,
                self.consecutive_failures
            );
        }
    }

    fn shutdown(mut self) -> WorkerExit {
        let summary = if self.sink.is_recording() {
            match self.sink.stop() {
                Ok(summary) => Some(summary),
                Err(e) => {
                    log::error!("[CAPTURE] Failed to finalize recording: {}", e);
                    None
                },
            }
        } else {
            None
        };
        self.source.close();
        // Unanswered requests fail on the caller's side once their reply
        // senders are dropped.
        drop(self.commands.drain());
        log::debug!(
            "[CAPTURE] Worker exiting after {} frames",
            self.counters.frames_captured.load(Ordering::Relaxed)
        );
        WorkerExit {
            source: self.source,
            processor: self.processor,
            summary,
        }
    }
}

#[cfg(test)]
mod tests;
