//! End-to-end tests for the capture loop, driven by the synthetic source.

use std::time::Instant;

use super::*;
use crate::source::TestPatternSource;

fn fast_config() -> CaptureConfig {
    CaptureConfig {
        cadence_ms: 2,
        mirror: false,
        ..CaptureConfig::default()
    }
}

fn spawn_pattern(source: TestPatternSource, config: CaptureConfig) -> CaptureHandle {
    let mut source = source;
    source.open().unwrap();
    CaptureLoop::spawn(
        Box::new(source),
        FrameProcessor::without_detection(),
        Filter::None,
        config,
    )
    .unwrap()
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[test]
fn test_frames_reach_display() {
    let handle = spawn_pattern(TestPatternSource::new(32, 24), fast_config());
    let frame = handle
        .display_receiver()
        .recv_timeout(Duration::from_secs(2))
        .unwrap();
    assert_eq!(frame.size(), (32, 24));
}

#[test]
fn test_display_queue_stays_bounded() {
    let handle = spawn_pattern(TestPatternSource::new(16, 16), fast_config());
    assert!(wait_until(Duration::from_secs(5), || {
        handle.stats().frames_captured >= 20
    }));
    assert!(handle.display_receiver().len() <= 2);
    assert!(handle.stats().display_dropped > 0);
}

#[test]
fn test_empty_reads_are_skipped() {
    let handle = spawn_pattern(
        TestPatternSource::new(16, 16).with_empty_reads(5),
        fast_config(),
    );
    let frame = handle
        .display_receiver()
        .recv_timeout(Duration::from_secs(2))
        .unwrap();
    assert!(!frame.is_empty());
    let stats = handle.stats();
    assert_eq!(stats.empty_reads, 5);
    assert!(stats.frames_captured >= 1);
}

#[test]
fn test_stop_is_acknowledged() {
    let mut handle = spawn_pattern(TestPatternSource::new(16, 16), fast_config());
    handle
        .display_receiver()
        .recv_timeout(Duration::from_secs(2))
        .unwrap();

    assert!(handle.is_running());
    assert_eq!(handle.stop().unwrap(), None);
    assert!(!handle.is_running());

    // The worker is gone: the queue drains and then reports disconnection.
    let captured = handle.stats().frames_captured;
    let rx = handle.display_receiver().clone();
    while rx.try_recv().is_ok() {}
    assert!(matches!(rx.try_recv(), Err(flume::TryRecvError::Disconnected)));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(handle.stats().frames_captured, captured);

    // Stopping twice is harmless; commands now fail.
    assert_eq!(handle.stop().unwrap(), None);
    assert!(matches!(
        handle.snapshot(),
        Err(StudioError::ChannelClosed(_))
    ));
}

#[test]
fn test_filter_applies_to_later_frames() {
    let handle = spawn_pattern(TestPatternSource::new(16, 16), fast_config());
    handle.set_filter(Filter::BlackAndWhite).unwrap();

    let gray = |frame: &Frame| {
        frame
            .data
            .chunks_exact(3)
            .all(|px| px[0] == px[1] && px[1] == px[2])
    };
    let rx = handle.display_receiver();
    let mut saw_gray = false;
    for _ in 0..50 {
        let frame = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        if gray(&frame) {
            saw_gray = true;
            break;
        }
    }
    assert!(saw_gray);
}

#[test]
fn test_initial_filter_applies_to_first_frame() {
    for _ in 0..20 {
        let mut source = TestPatternSource::new(16, 16);
        source.open().unwrap();
        let handle = CaptureLoop::spawn(
            Box::new(source),
            FrameProcessor::without_detection(),
            Filter::BlackAndWhite,
            fast_config(),
        )
        .unwrap();
        let first = handle
            .display_receiver()
            .recv_timeout(Duration::from_secs(2))
            .unwrap();
        assert!(first
            .data
            .chunks_exact(first.format.channels())
            .all(|px| px[0] == px[1] && px[1] == px[2]));
    }
}

#[test]
fn test_snapshot_is_unprocessed() {
    let config = CaptureConfig {
        mirror: true,
        ..fast_config()
    };
    let handle = spawn_pattern(TestPatternSource::new(16, 16), config);
    handle.set_filter(Filter::Sepia).unwrap();
    handle
        .display_receiver()
        .recv_timeout(Duration::from_secs(2))
        .unwrap();

    let still = handle.snapshot().unwrap().unwrap();
    assert_eq!(still.size(), (16, 16));
    // Pattern below the moving square: green = y, red = x + y. Neither the
    // sepia filter nor the mirror has touched the still.
    assert_eq!(still.pixel(0, 10)[1], 10);
    assert_eq!(still.pixel(0, 10)[2], 10);
    // Capture continues after a snapshot.
    let before = handle.stats().frames_captured;
    assert!(wait_until(Duration::from_secs(2), || {
        handle.stats().frames_captured > before
    }));
}

#[test]
fn test_recording_through_loop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.gif");
    let handle = spawn_pattern(TestPatternSource::new(32, 24), fast_config());

    handle.start_recording(&path, Container::Gif, 30).unwrap();
    assert!(matches!(
        handle.start_recording(&path, Container::Gif, 30),
        Err(StudioError::AlreadyRecording)
    ));
    assert!(wait_until(Duration::from_secs(20), || {
        handle.stats().frames_recorded >= 90
    }));
    let summary = handle.stop_recording().unwrap();

    assert!(summary.frames_written >= 90);
    assert_eq!(summary.frame_size, (32, 24));
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
    assert!(matches!(
        handle.stop_recording(),
        Err(StudioError::RecordingNotActive)
    ));
}

#[test]
fn test_stop_finalizes_open_recording() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.gif");
    let mut handle = spawn_pattern(TestPatternSource::new(16, 16), fast_config());

    handle.start_recording(&path, Container::Gif, 30).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        handle.stats().frames_recorded >= 3
    }));
    let summary = handle.stop().unwrap().unwrap();
    assert_eq!(summary.output_path, path);
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn test_reclaimed_source_can_restart() {
    let mut handle = spawn_pattern(TestPatternSource::new(16, 16), fast_config());
    assert!(handle.reclaim().is_none());
    handle
        .display_receiver()
        .recv_timeout(Duration::from_secs(2))
        .unwrap();
    handle.stop().unwrap();

    let (mut source, processor) = handle.reclaim().unwrap();
    assert_eq!(source.frame_size(), (0, 0), "worker closes the source");
    source.open().unwrap();
    let restarted = CaptureLoop::spawn(source, processor, Filter::None, fast_config()).unwrap();
    let frame = restarted
        .display_receiver()
        .recv_timeout(Duration::from_secs(2))
        .unwrap();
    assert_eq!(frame.size(), (16, 16));
}
