//! MP4 encoding through an ffmpeg child process.
//!
//! Raw BGR frames are piped to ffmpeg's stdin and encoded as H.264.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use super::VideoEncoder;
use crate::error::{StudioError, StudioResult};
use crate::frame::{Frame, PixelFormat};

/// Video encoder every clip is written with.
const H264_ENCODER: &str = "libx264";

/// Create a Command configured to hide the console window on Windows.
#[cfg(windows)]
fn create_hidden_command(program: &Path) -> Command {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x08000000;

    let mut cmd = Command::new(program);
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd
}

#[cfg(not(windows))]
fn create_hidden_command(program: &Path) -> Command {
    Command::new(program)
}

/// Find a working ffmpeg: ffmpeg-sidecar's location first, then system PATH.
pub fn find_ffmpeg() -> Option<PathBuf> {
    let sidecar_path = ffmpeg_sidecar::paths::ffmpeg_path();
    if test_ffmpeg_binary(&sidecar_path) {
        log::debug!("[FFMPEG] Using sidecar path: {}", sidecar_path.display());
        return Some(sidecar_path);
    }

    let binary_name = if cfg!(windows) {
        "ffmpeg.exe"
    } else {
        "ffmpeg"
    };
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(binary_name);
        if candidate.is_file() && test_ffmpeg_binary(&candidate) {
            log::debug!("[FFMPEG] Using system PATH: {}", candidate.display());
            return Some(candidate);
        }
    }

    log::warn!("[FFMPEG] No working ffmpeg found");
    None
}

fn test_ffmpeg_binary(path: &Path) -> bool {
    Command::new(path)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Ask `ffmpeg` whether it was built with `encoder`.
///
/// Builds without it still answer `-version`, and only fail once frames
/// arrive.
pub fn check_encoder(ffmpeg: &Path, encoder: &str) -> StudioResult<()> {
    let output = create_hidden_command(ffmpeg)
        .args(["-hide_banner", "-h"])
        .arg(format!("encoder={}", encoder))
        .stdin(Stdio::null())
        .output()
        .map_err(|e| StudioError::EncoderError(format!("Failed to query FFmpeg: {}", e)))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    if output.status.success() && stdout.contains(&format!("Encoder {}", encoder)) {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    Err(StudioError::EncoderError(format!(
        "FFmpeg at {} cannot encode with {}: {}",
        ffmpeg.display(),
        encoder,
        detail
    )))
}

/// ffmpeg process ready to receive frames.
pub struct FfmpegEncoder {
    stdin: Option<ChildStdin>,
    child: Option<Child>,
    output_path: PathBuf,
    frame_size: (u32, u32),
    /// Scratch buffer for BGRA -> BGR conversion.
    scratch: Vec<u8>,
}

impl FfmpegEncoder {
    /// Spawn ffmpeg writing to `output_path`.
    pub fn new(output_path: &Path, frame_size: (u32, u32), fps: u32) -> StudioResult<Self> {
        let ffmpeg_path = find_ffmpeg().ok_or(StudioError::FfmpegNotFound)?;
        check_encoder(&ffmpeg_path, H264_ENCODER)?;
        let (width, height) = frame_size;
        let size = format!("{}x{}", width, height);
        let rate = fps.max(1).to_string();

        log::info!(
            "[FFMPEG] Spawning encoder {} @ {} fps -> {}",
            size,
            rate,
            output_path.display()
        );

        let mut child = create_hidden_command(&ffmpeg_path)
            .args([
                "-y",
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "bgr24",
                "-s",
                &size,
                "-framerate",
                &rate,
                "-i",
                "pipe:0",
                // yuv420p needs even dimensions.
                "-vf",
                "pad=ceil(iw/2)*2:ceil(ih/2)*2",
                "-c:v",
                H264_ENCODER,
                "-preset",
                "ultrafast",
                "-crf",
                "18",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ])
            .arg(output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StudioError::EncoderError(format!("Failed to start FFmpeg: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StudioError::EncoderError("Failed to get FFmpeg stdin".to_string()))?;

        // An argument error ends the process before it reads any input.
        let exited = child
            .try_wait()
            .map_err(|e| StudioError::EncoderError(format!("FFmpeg wait error: {}", e)))?;
        if let Some(status) = exited {
            drop(stdin);
            let output = child
                .wait_with_output()
                .map_err(|e| StudioError::EncoderError(format!("FFmpeg wait error: {}", e)))?;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StudioError::EncoderError(format!(
                "FFmpeg exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        Ok(Self {
            stdin: Some(stdin),
            child: Some(child),
            output_path: output_path.to_path_buf(),
            frame_size,
            scratch: Vec::new(),
        })
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn write_frame(&mut self, frame: &Frame) -> StudioResult<()> {
        if frame.size() != self.frame_size {
            return Err(StudioError::EncoderError(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width, frame.height, self.frame_size.0, self.frame_size.1
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or(StudioError::RecordingNotActive)?;
        let bytes: &[u8] = match frame.format {
            PixelFormat::Bgr8 => &frame.data,
            PixelFormat::Bgra8 => {
                self.scratch.clear();
                for px in frame.data.chunks_exact(4) {
                    self.scratch.extend_from_slice(&px[..3]);
                }
                &self.scratch
            },
        };
        stdin
            .write_all(bytes)
            .map_err(|e| StudioError::EncoderError(format!("FFmpeg pipe closed: {}", e)))
    }

    fn finish(mut self: Box<Self>) -> StudioResult<()> {
        // Closing stdin signals end of stream.
        drop(self.stdin.take());
        let Some(child) = self.child.take() else {
            return Ok(());
        };
        let output = child
            .wait_with_output()
            .map_err(|e| StudioError::EncoderError(format!("FFmpeg wait error: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StudioError::EncoderError(format!(
                "FFmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        log::debug!("[FFMPEG] Finished {}", self.output_path.display());
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        // Dropped without finish(): abandon the clip.
        if let Some(mut child) = self.child.take() {
            drop(self.stdin.take());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
