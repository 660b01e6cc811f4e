//! Live webcam studio: filtered camera preview with face overlays, stills,
//! clip recording and clip playback.
//!
//! Data flows one way: a [`FrameSource`] feeds the capture worker
//! ([`CaptureLoop`]), which runs each frame through the [`FrameProcessor`],
//! writes it to the [`RecordingSink`] when recording and queues a copy for
//! the [`Shell`]. Control flows back over the worker's command channel.

pub mod capture;
pub mod config;
pub mod detect;
pub mod error;
pub mod filter;
pub mod frame;
pub mod indicator;
pub mod logging;
pub mod playback;
pub mod processor;
pub mod queue;
pub mod recording;
pub mod shell;
pub mod source;

pub use capture::{CaptureHandle, CaptureLoop, CaptureStats};
pub use config::StudioConfig;
pub use detect::{DetectParams, FaceDetector, FaceRect, HaarCascade, NoopDetector};
pub use error::{StudioError, StudioResult};
pub use filter::Filter;
pub use frame::{Frame, PixelFormat};
pub use indicator::RecordingIndicator;
pub use playback::{ClipClock, MediaElement, PlaybackController, PlaybackState};
pub use processor::FrameProcessor;
pub use recording::{Container, RecordingSink, RecordingSummary};
pub use shell::{Display, Notifier, Shell, UserIntent};
pub use source::{create_source, FrameSource, TestPatternSource};
