//! Logging setup for the studio.
//!
//! Everything logs through the `log` facade with a `[TAG]` prefix. The
//! backend is env_logger (filter from `RUST_LOG`, default `info`), writing to
//! stderr or to one file per day with old files cleaned up.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use env_logger::{Builder, Env, Target};

use crate::error::{ResultExt, StudioResult};

/// Maximum number of log files to keep.
const MAX_LOG_FILES: usize = 5;

const LOG_PREFIX: &str = "webcam-studio_";

/// `webcam-studio_YYYY-MM-DD.log`.
pub fn log_file_name(date: NaiveDate) -> String {
    format!("{}{}.log", LOG_PREFIX, date.format("%Y-%m-%d"))
}

/// Today's log file in `log_dir`.
pub fn current_log_path(log_dir: &Path) -> PathBuf {
    log_dir.join(log_file_name(Local::now().date_naive()))
}

/// Install the global logger.
///
/// With `log_dir` set, lines are appended to today's file there and older
/// files beyond the retention limit are removed; otherwise they go to
/// stderr. Returns the log file path, if any.
pub fn init_logging(log_dir: Option<&Path>) -> StudioResult<Option<PathBuf>> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] [{}] [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    let log_path = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let path = current_log_path(dir);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            builder.target(Target::Pipe(Box::new(file)));
            cleanup_old_logs(dir);
            Some(path)
        },
        None => {
            builder.target(Target::Stderr);
            None
        },
    };

    builder.try_init().context("Logger already installed")?;

    log::info!("[LOG] Logging system initialized");
    if let Some(path) = &log_path {
        log::info!("[LOG] Log file: {}", path.display());
    }
    Ok(log_path)
}

/// Keep only the newest `MAX_LOG_FILES` daily logs in `log_dir`.
///
/// File names carry the date, so name order is age order.
pub fn cleanup_old_logs(log_dir: &Path) {
    let Ok(entries) = fs::read_dir(log_dir) else {
        return;
    };
    let mut log_files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|path| {
            path.extension().map(|ext| ext == "log").unwrap_or(false)
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(LOG_PREFIX))
                    .unwrap_or(false)
        })
        .collect();

    // Newest first.
    log_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    for path in log_files.into_iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(&path) {
            log::warn!("[LOG] Could not remove old log {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(log_file_name(date), "webcam-studio_2024-01-07.log");
    }

    #[test]
    fn test_cleanup_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        for day in 1..=8 {
            let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
            fs::write(dir.path().join(log_file_name(date)), "x").unwrap();
        }
        fs::write(dir.path().join("other.log"), "x").unwrap();
        fs::write(dir.path().join("webcam-studio_notes.txt"), "x").unwrap();

        cleanup_old_logs(dir.path());

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                "other.log",
                "webcam-studio_2024-03-04.log",
                "webcam-studio_2024-03-05.log",
                "webcam-studio_2024-03-06.log",
                "webcam-studio_2024-03-07.log",
                "webcam-studio_2024-03-08.log",
                "webcam-studio_notes.txt",
            ]
        );
    }

    #[test]
    fn test_cleanup_missing_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        cleanup_old_logs(&dir.path().join("absent"));
    }
}
