//! Console and rolling-file log output.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::error::AppError;

/// Used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "exam_watch=info";

const LOG_FILE_PREFIX: &str = "exam-watch";
const KEPT_LOG_FILES: usize = 7;

/// Installs the global subscriber fed by the `log` macros.
///
/// Records go to stdout and to a daily file under `config.logs_path`. The returned guard
/// flushes the file writer when dropped, so hold it until the process exits.
pub fn setup_logging(config: &Config) -> Result<WorkerGuard, AppError> {
    let (file_writer, guard) = tracing_appender::non_blocking(daily_appender(&config.logs_path)?);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stdout).with_target(false))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .map_err(|e| AppError::ConfigurationError {
            msg: format!("Failed to install log subscriber: {e}"),
        })?;

    Ok(guard)
}

fn daily_appender(dir: &Path) -> Result<RollingFileAppender, AppError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(KEPT_LOG_FILES)
        .build(dir)
        .map_err(|e| AppError::ConfigurationError {
            msg: format!("Cannot write logs to '{}': {e}", dir.display()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_appender_creates_directory() {
        let dir = std::env::temp_dir().join(format!("exam-watch-logs-{}", uuid::Uuid::new_v4()));

        daily_appender(&dir).expect("appender");

        assert!(dir.is_dir());
        let _ = std::fs::remove_dir_all(dir);
    }
}
