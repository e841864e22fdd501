//! Tracing setup for the server process.
//!
//! On Linux the journal is preferred. Elsewhere, or when no journal socket
//! is reachable, events go to stderr and to `bildarkiv.log` in the log
//! directory, rotated daily.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const FILTER_ENV: &str = "BILDARKIV_LOG";
const DEFAULT_DIRECTIVES: &str = "info,tower_http=warn";

// Dropping the guard stops the background writer.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bildarkiv")
        .join("logs")
}

fn file_writer(log_dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::daily(log_dir, "bildarkiv.log");
    Ok(tracing_appender::non_blocking(appender))
}

/// Install the global subscriber. Filter directives come from
/// `BILDARKIV_LOG` (for example `debug` or `bildarkiv=trace,warn`).
///
/// Fails if a subscriber is already installed.
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(journald) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(filter())
                .with(journald)
                .try_init()?;
            tracing::info!(backend = "journald", "Logging ready");
            return Ok(());
        }
    }

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    let (writer, guard) = file_writer(&log_dir)?;
    let _ = FILE_GUARD.set(guard);

    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()?;

    tracing::info!(backend = "file", log_dir = ?log_dir, "Logging ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("nested").join("logs");

        let _writer = file_writer(&log_dir).unwrap();
        assert!(log_dir.is_dir());
    }

    #[test]
    fn test_default_directives_parse() {
        assert!(EnvFilter::try_new(DEFAULT_DIRECTIVES).is_ok());
    }
}
