//! Blinking "REC" label with elapsed recording time.

use std::time::{Duration, Instant};

const DOT: &str = "●";

/// `hh:mm:ss`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}

/// Elapsed-time readout, live only while a recording is open.
#[derive(Debug, Default)]
pub struct RecordingIndicator {
    started: Option<Instant>,
    elapsed: Duration,
    blink: bool,
    label: String,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.started.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Empty while inactive.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn start(&mut self, now: Instant) {
        self.started = Some(now);
        self.elapsed = Duration::ZERO;
        self.blink = true;
        self.render();
    }

    /// Recompute elapsed time and flip the blink. No-op while inactive.
    pub fn tick(&mut self, now: Instant) -> Option<&str> {
        let started = self.started?;
        self.elapsed = now.saturating_duration_since(started);
        self.blink = !self.blink;
        self.render();
        Some(&self.label)
    }

    pub fn stop(&mut self) {
        self.started = None;
        self.elapsed = Duration::ZERO;
        self.blink = false;
        self.label.clear();
    }

    fn render(&mut self) {
        let dot = if self.blink { DOT } else { " " };
        self.label = format!("{} REC {}", dot, format_elapsed(self.elapsed));
    }
}
