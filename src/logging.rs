// src/logging.rs
// =============================================================================
// Log setup.
//
// Logs always go to <log_dir>/scraper.log.<date> (rotated daily, the five
// newest files are kept, written by a background thread). stdout is reserved for the JSON report and stderr for
// the progress bar, so the terminal only gets log lines when asked for
// with -v.
//
// Levels come from RUST_LOG when it is set, e.g.
//   RUST_LOG=site_scraper=debug,reqwest=warn
// =============================================================================

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE: &str = "scraper.log";
// Rotated files kept on disk, older ones are deleted
const MAX_LOG_FILES: usize = 5;

// Installs the global subscriber
//
// The returned guard flushes buffered lines when dropped, so keep it alive
// until the program is about to exit.
pub fn init(log_dir: &Path, verbose: u8) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let default_level = if verbose >= 2 { "debug" } else { "info" };
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE)
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)
        .with_context(|| format!("opening log file in {}", log_dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_filter(filter());

    let stderr_layer = (verbose > 0).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .with_filter(filter())
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("installing the log subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let guard = init(&log_dir, 0).unwrap();
        tracing::info!(phase = "fetch", "hello from the test");
        drop(guard);

        assert!(log_dir.is_dir());
        let names: Vec<String> = std::fs::read_dir(&log_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|name| name.starts_with("scraper.log")));
    }
}
