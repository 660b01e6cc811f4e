//! Native webcam source using nokhwa.
//!
//! nokhwa cameras cannot cross threads, so the device lives on its own
//! `camera-feed` thread. That thread opens the camera, reports the outcome
//! back to `open`, then polls frames into a single-slot channel. `read`
//! takes whatever frame is newest, or reports an empty read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use flume::{Receiver, Sender};

use crate::error::{StudioError, StudioResult};
use crate::frame::Frame;
use crate::queue::{drop_oldest, DropOldestSender};

/// How long `open` waits for the device to answer.
const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after a failed poll before asking the device again.
const POLL_ERROR_DELAY: Duration = Duration::from_millis(10);

pub struct CameraSource {
    device_index: usize,
    target_fps: u32,
    frames: Option<Receiver<Frame>>,
    stop_signal: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    dimensions: (u32, u32),
}

impl CameraSource {
    /// Create a source for the given device. Does NOT open it.
    pub fn new(device_index: usize, target_fps: u32) -> Self {
        Self {
            device_index,
            target_fps,
            frames: None,
            stop_signal: Arc::new(AtomicBool::new(false)),
            thread: None,
            dimensions: (0, 0),
        }
    }
}

impl super::FrameSource for CameraSource {
    fn open(&mut self) -> StudioResult<()> {
        if self.thread.is_some() {
            return Ok(());
        }

        // Fresh flag: a feed thread abandoned by a timed-out open keeps the old one.
        self.stop_signal = Arc::new(AtomicBool::new(false));
        let (frame_tx, frame_rx) = drop_oldest(1);
        let (ready_tx, ready_rx) = flume::bounded(1);
        let device_index = self.device_index;
        let target_fps = self.target_fps;
        let stop_signal = Arc::clone(&self.stop_signal);

        let thread = std::thread::Builder::new()
            .name("camera-feed".to_string())
            .spawn(move || {
                feed_loop(device_index, target_fps, frame_tx, ready_tx, stop_signal);
            })
            .map_err(|e| {
                StudioError::DeviceUnavailable(format!("Failed to spawn camera thread: {}", e))
            })?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(dimensions)) => {
                self.dimensions = dimensions;
                self.frames = Some(frame_rx);
                self.thread = Some(thread);
                Ok(())
            },
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            },
            Err(_) => {
                self.stop_signal.store(true, Ordering::SeqCst);
                Err(StudioError::DeviceUnavailable(format!(
                    "device {} did not respond",
                    device_index
                )))
            },
        }
    }

    fn read(&mut self) -> StudioResult<Option<Frame>> {
        let Some(frames) = self.frames.as_ref() else {
            return Ok(None);
        };
        match frames.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(flume::TryRecvError::Empty) => Ok(None),
            Err(flume::TryRecvError::Disconnected) => Err(StudioError::CaptureError(
                "camera feed thread exited".to_string(),
            )),
        }
    }

    fn frame_size(&self) -> (u32, u32) {
        self.dimensions
    }

    fn close(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        self.frames = None;
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        use super::FrameSource;
        self.close();
    }
}

fn feed_loop(
    device_index: usize,
    target_fps: u32,
    frames: DropOldestSender<Frame>,
    ready: Sender<StudioResult<(u32, u32)>>,
    stop_signal: Arc<AtomicBool>,
) {
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
    use nokhwa::Camera;

    log::info!(
        "[CAMERA_FEED] Opening device {} at {} fps",
        device_index,
        target_fps
    );

    let requested =
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::HighestFrameRate(target_fps));
    let opened = Camera::new(CameraIndex::Index(device_index as u32), requested).and_then(
        |mut camera| {
            camera.open_stream()?;
            Ok(camera)
        },
    );
    let mut camera = match opened {
        Ok(camera) => camera,
        Err(e) => {
            log::error!("[CAMERA_FEED] Failed to open device {}: {}", device_index, e);
            let _ = ready.send(Err(StudioError::DeviceUnavailable(e.to_string())));
            return;
        },
    };

    let resolution = camera.resolution();
    let (width, height) = (resolution.width(), resolution.height());
    log::info!(
        "[CAMERA_FEED] Camera opened: {} ({}x{} {:?})",
        camera.info().human_name(),
        width,
        height,
        camera.frame_format()
    );
    if ready.send(Ok((width, height))).is_err() {
        let _ = camera.stop_stream();
        return;
    }

    let mut frame_id: u64 = 0;
    let mut errors: u64 = 0;
    while !stop_signal.load(Ordering::SeqCst) {
        let buffer = match camera.frame() {
            Ok(buffer) => buffer,
            Err(e) => {
                errors += 1;
                if errors == 1 || errors % 300 == 0 {
                    log::warn!("[CAMERA_FEED] Frame poll error ({}): {}", errors, e);
                }
                std::thread::sleep(POLL_ERROR_DELAY);
                continue;
            },
        };
        let decoded = match buffer.decode_image::<RgbFormat>() {
            Ok(image) => image,
            Err(e) => {
                log::warn!("[CAMERA_FEED] Frame decode error: {}", e);
                continue;
            },
        };
        let frame = match Frame::from_rgb(decoded.width(), decoded.height(), decoded.as_raw()) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("[CAMERA_FEED] Dropping malformed frame: {}", e);
                continue;
            },
        };
        frame_id += 1;

        if frames.send(frame).is_err() {
            break;
        }
    }

    let _ = camera.stop_stream();
    log::info!("[CAMERA_FEED] Capture stopped after {} frames", frame_id);
}
