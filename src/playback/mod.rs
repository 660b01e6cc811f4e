//! Clip playback: a small state machine over a media element and the
//! seek slider bound to it.
//!
//! The slider is written from two places. While the user drags it
//! (`seek_begin` .. `seek_end`) only the drag writes, and the periodic
//! tick leaves both slider and label alone; the last dragged value is
//! applied to the media once, on release.

mod clock;

pub use clock::ClipClock;

use std::time::Duration;

use serde::Serialize;

/// A player the controller can drive.
pub trait MediaElement {
    fn play(&mut self);
    fn pause(&mut self);
    fn position(&self) -> Duration;
    fn set_position(&mut self, position: Duration);
    fn duration(&self) -> Duration;
    /// True once playback has run to the end of the media.
    fn has_ended(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// `mm:ss`. Minutes keep counting past an hour.
pub fn format_clock(time: Duration) -> String {
    let secs = time.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub struct PlaybackController<M: MediaElement> {
    media: M,
    state: PlaybackState,
    is_seeking: bool,
    /// Slider position in seconds.
    slider_value: f64,
    /// Slider range maximum in seconds.
    slider_max: f64,
    label: String,
    /// Last drag value, applied on release.
    pending_seek: Option<f64>,
}

impl<M: MediaElement> PlaybackController<M> {
    pub fn new(media: M) -> Self {
        let mut controller = Self {
            media,
            state: PlaybackState::Stopped,
            is_seeking: false,
            slider_value: 0.0,
            slider_max: 0.0,
            label: String::new(),
            pending_seek: None,
        };
        controller.sync_from_media();
        controller
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_seeking(&self) -> bool {
        self.is_seeking
    }

    pub fn slider_value(&self) -> f64 {
        self.slider_value
    }

    pub fn slider_max(&self) -> f64 {
        self.slider_max
    }

    /// `mm:ss / mm:ss`, position then duration.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The periodic tick should run.
    pub fn tick_active(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn play(&mut self) {
        self.media.play();
        self.state = PlaybackState::Playing;
        log::debug!("[PLAYBACK] Playing");
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.media.pause();
        self.state = PlaybackState::Paused;
        self.sync_from_media();
        log::debug!("[PLAYBACK] Paused at {}", format_clock(self.media.position()));
    }

    /// Halt playback and rewind.
    pub fn stop(&mut self) {
        self.media.pause();
        self.media.set_position(Duration::ZERO);
        self.state = PlaybackState::Stopped;
        self.is_seeking = false;
        self.pending_seek = None;
        self.sync_from_media();
    }

    /// The user grabbed the slider.
    pub fn seek_begin(&mut self) {
        self.is_seeking = true;
    }

    /// The user dragged the slider to `seconds`.
    pub fn seek_to(&mut self, seconds: f64) {
        let value = if seconds.is_finite() {
            seconds.clamp(0.0, self.slider_max)
        } else {
            0.0
        };
        self.slider_value = value;
        self.pending_seek = Some(value);
        self.label = self.format_label(Duration::from_secs_f64(value));
        if !self.is_seeking {
            // A click without a drag: apply right away.
            self.apply_pending_seek();
        }
    }

    /// The user released the slider.
    pub fn seek_end(&mut self) {
        self.is_seeking = false;
        self.apply_pending_seek();
        self.sync_from_media();
    }

    /// The media reached its end.
    pub fn media_ended(&mut self) {
        self.media.pause();
        self.media.set_position(Duration::ZERO);
        self.state = PlaybackState::Stopped;
        self.sync_from_media();
        log::debug!("[PLAYBACK] Reached end of clip");
    }

    /// Periodic refresh of slider and label from the media.
    ///
    /// Returns false when a drag is in progress and nothing was written.
    pub fn tick(&mut self) -> bool {
        if self.is_seeking {
            return false;
        }
        if self.state == PlaybackState::Playing && self.media.has_ended() {
            self.media_ended();
            return true;
        }
        self.sync_from_media();
        true
    }

    fn apply_pending_seek(&mut self) {
        if let Some(value) = self.pending_seek.take() {
            self.media.set_position(Duration::from_secs_f64(value));
        }
    }

    fn sync_from_media(&mut self) {
        let position = self.media.position();
        self.slider_max = self.media.duration().as_secs_f64();
        self.slider_value = position.as_secs_f64();
        self.label = self.format_label(position);
    }

    fn format_label(&self, position: Duration) -> String {
        format!(
            "{} / {}",
            format_clock(position),
            format_clock(self.media.duration())
        )
    }
}
