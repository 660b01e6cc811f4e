//! Clock-driven stand-in for a video player.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::MediaElement;

/// Plays a recorded clip of known length against the wall clock.
///
/// The windowing layer renders the file; this keeps the position that the
/// slider and label follow.
#[derive(Debug, Clone)]
pub struct ClipClock {
    path: PathBuf,
    duration: Duration,
    /// Position when playback last started or was moved.
    base: Duration,
    /// Set while playing.
    playing_since: Option<Instant>,
}

impl ClipClock {
    pub fn new(path: &Path, duration: Duration) -> Self {
        Self {
            path: path.to_path_buf(),
            duration,
            base: Duration::ZERO,
            playing_since: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Position at `now`, capped at the clip length.
    pub fn position_at(&self, now: Instant) -> Duration {
        let running = self
            .playing_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default();
        (self.base + running).min(self.duration)
    }

    pub fn play_at(&mut self, now: Instant) {
        if self.playing_since.is_none() {
            if self.base >= self.duration {
                self.base = Duration::ZERO;
            }
            self.playing_since = Some(now);
        }
    }

    pub fn pause_at(&mut self, now: Instant) {
        self.base = self.position_at(now);
        self.playing_since = None;
    }

    pub fn set_position_at(&mut self, position: Duration, now: Instant) {
        self.base = position.min(self.duration);
        if self.playing_since.is_some() {
            self.playing_since = Some(now);
        }
    }
}

impl MediaElement for ClipClock {
    fn play(&mut self) {
        self.play_at(Instant::now());
    }

    fn pause(&mut self) {
        self.pause_at(Instant::now());
    }

    fn position(&self) -> Duration {
        self.position_at(Instant::now())
    }

    fn set_position(&mut self, position: Duration) {
        self.set_position_at(position, Instant::now());
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn has_ended(&self) -> bool {
        self.playing_since.is_some() && self.position() >= self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_follows_clock() {
        let t0 = Instant::now();
        let mut clip = ClipClock::new(Path::new("clip.mp4"), Duration::from_secs(3));
        assert_eq!(clip.position_at(t0), Duration::ZERO);

        clip.play_at(t0);
        assert_eq!(clip.position_at(t0 + Duration::from_secs(1)), Duration::from_secs(1));

        clip.pause_at(t0 + Duration::from_secs(2));
        assert_eq!(clip.position_at(t0 + Duration::from_secs(9)), Duration::from_secs(2));
    }

    #[test]
    fn test_position_capped_at_duration() {
        let t0 = Instant::now();
        let mut clip = ClipClock::new(Path::new("clip.mp4"), Duration::from_secs(3));
        clip.play_at(t0);
        assert_eq!(clip.position_at(t0 + Duration::from_secs(10)), Duration::from_secs(3));
    }

    #[test]
    fn test_seek_while_playing_restarts_from_target() {
        let t0 = Instant::now();
        let mut clip = ClipClock::new(Path::new("clip.mp4"), Duration::from_secs(10));
        clip.play_at(t0);
        clip.set_position_at(Duration::from_secs(5), t0 + Duration::from_secs(1));
        assert_eq!(clip.position_at(t0 + Duration::from_secs(2)), Duration::from_secs(6));
    }

    #[test]
    fn test_play_after_end_rewinds() {
        let t0 = Instant::now();
        let mut clip = ClipClock::new(Path::new("clip.mp4"), Duration::from_secs(1));
        clip.play_at(t0);
        clip.pause_at(t0 + Duration::from_secs(5));
        clip.play_at(t0 + Duration::from_secs(6));
        assert_eq!(clip.position_at(t0 + Duration::from_secs(6)), Duration::ZERO);
    }
}
