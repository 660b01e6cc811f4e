//! Stand-in ffmpeg binaries for encoder tests.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::PermissionsExt;

use parking_lot::{const_mutex, Mutex, MutexGuard};
use tempfile::TempDir;

/// Held by every test that resolves ffmpeg, since PATH is process-wide.
static FFMPEG_LOCK: Mutex<()> = const_mutex(());

/// Answers `-version` like a real build but has no H.264 encoder.
const BROKEN_FFMPEG: &str = r#"#!/bin/sh
if [ "$1" = "-version" ]; then
    echo "ffmpeg version 0.0-test"
    exit 0
fi
echo "Unknown encoder 'libx264'" >&2
exit 1
"#;

pub(crate) fn ffmpeg_lock() -> MutexGuard<'static, ()> {
    FFMPEG_LOCK.lock()
}

/// Makes a broken `ffmpeg` the only one on PATH until dropped.
pub(crate) struct BrokenFfmpeg {
    saved_path: Option<OsString>,
    _dir: TempDir,
    _lock: MutexGuard<'static, ()>,
}

impl BrokenFfmpeg {
    pub(crate) fn install() -> Self {
        let lock = ffmpeg_lock();
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ffmpeg");
        fs::write(&script, BROKEN_FFMPEG).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        let saved_path = env::var_os("PATH");
        env::set_var("PATH", dir.path());
        Self {
            saved_path,
            _dir: dir,
            _lock: lock,
        }
    }
}

impl Drop for BrokenFfmpeg {
    fn drop(&mut self) {
        match self.saved_path.take() {
            Some(path) => env::set_var("PATH", path),
            None => env::remove_var("PATH"),
        }
    }
}
