//! Log output for the networking layer
//!
//! Files go to `$XDG_STATE_HOME/liquid/` and rotate at UTC midnight. Each day
//! gets its own file named `liquid.YYYY-MM-DD.log`; use [`current_log_file`]
//! to find the one being written.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};

const LOG_FILE_PREFIX: &str = "liquid";
const LOG_FILE_SUFFIX: &str = "log";

/// Install the global subscriber writing to the dated log files
///
/// `RUST_LOG` wins over `config.level`. Fails if a subscriber is already set.
/// Keep the returned guard alive; dropping it flushes buffered lines.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let dir = log_dir();
    let appender = file_appender(&dir, config.max_files)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(level_filter(&config.level))
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install log subscriber: {}", e)))?;

    tracing::info!(
        file = %current_log_file().display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard { _worker: guard })
}

/// Route log output to the test harness; safe to call from every test
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Keeps the background log writer running
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

/// Directory holding the log files
pub fn log_dir() -> PathBuf {
    Config::state_dir()
}

/// Log file written on `date` (UTC)
pub fn log_file_for(date: NaiveDate) -> PathBuf {
    log_dir().join(log_file_name(date))
}

/// Log file for today (UTC)
pub fn current_log_file() -> PathBuf {
    log_file_for(Utc::now().date_naive())
}

fn log_file_name(date: NaiveDate) -> String {
    format!(
        "{}.{}.{}",
        LOG_FILE_PREFIX,
        date.format("%Y-%m-%d"),
        LOG_FILE_SUFFIX
    )
}

fn file_appender(dir: &Path, max_files: usize) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(max_files.max(1))
        .build(dir)
        .map_err(|e| Error::Config(format!("failed to create log appender: {}", e)))
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_names_are_dated() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let path = log_file_for(date);
        assert!(path.ends_with("liquid/liquid.2026-03-07.log"));
    }

    #[test]
    fn test_appender_writes_current_log_file() {
        let dir = TempDir::new().unwrap();
        let mut appender = file_appender(dir.path(), 3).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let name = current_log_file().file_name().unwrap().to_owned();
        let written = std::fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(written, "hello\n");
    }
}
