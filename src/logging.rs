//! Logging setup for the uploader crate.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Configuration for the logging system
pub struct LogConfig {
    /// Directory where log files will be stored
    pub log_dir: PathBuf,
    /// Prefix for log file names
    pub file_prefix: String,
    /// Maximum number of log files to keep (rotation)
    pub max_files: usize,
    /// Whether to write logs to file
    pub log_to_file: bool,
    /// Log level filter string (e.g. "info", "uploader=debug")
    pub log_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        let log_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chunked-uploader")
            .join("logs");

        Self {
            log_dir,
            file_prefix: "chunked-uploader".to_string(),
            max_files: 5,
            log_to_file: false,
            log_level: "info".to_string(),
        }
    }
}

/// Global flag for whether file logging is enabled
static FILE_LOGGING_ENABLED: OnceLock<std::sync::RwLock<bool>> = OnceLock::new();

/// Initialize the logging system with stdout output and optional file output.
///
/// # Log Targets
/// - `uploader` - orchestrator lifecycle
/// - `uploader::chunk` - per-chunk upload attempts
/// - `uploader::session` - session create/resume/poll
/// - `uploader::verify` - completion verification
///
/// # Example
/// ```bash
/// RUST_LOG=uploader=debug cargo test
/// ```
pub fn init_logging(config: LogConfig) -> Result<LogGuard> {
    FILE_LOGGING_ENABLED.get_or_init(|| std::sync::RwLock::new(config.log_to_file));

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let worker_guard = if config.log_to_file {
        std::fs::create_dir_all(&config.log_dir).context("failed to create log directory")?;

        let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix(&config.file_prefix)
            .filename_suffix("log")
            .max_log_files(config.max_files)
            .build(&config.log_dir)
            .context("failed to create file appender")?;

        let (non_blocking_file, worker_guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = fmt::layer()
            .compact()
            .with_writer(non_blocking_file)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

        let stdout_layer = fmt::layer()
            .compact()
            .with_target(true)
            .with_line_number(true)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stdout_layer)
            .init();

        worker_guard
    } else {
        let (non_blocking_sink, worker_guard) = tracing_appender::non_blocking(std::io::sink());
        drop(non_blocking_sink);

        let stdout_layer = fmt::layer()
            .compact()
            .with_target(true)
            .with_line_number(true)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .init();

        worker_guard
    };

    tracing::info!(
        target: "uploader",
        log_to_file = config.log_to_file,
        log_level = %config.log_level,
        "logging initialized"
    );

    Ok(LogGuard {
        _worker_guard: worker_guard,
    })
}

/// Get the current file logging enabled state.
pub fn is_file_logging_enabled() -> bool {
    FILE_LOGGING_ENABLED
        .get()
        .and_then(|lock| lock.read().ok())
        .map(|v| *v)
        .unwrap_or(false)
}

/// Guard that ensures logs are flushed before exit. Must be held for the
/// lifetime of the process when file logging is enabled.
pub struct LogGuard {
    _worker_guard: tracing_appender::non_blocking::WorkerGuard,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        tracing::debug!(target: "uploader", "flushing logs before shutdown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_config_is_stdout_only() {
        let config = LogConfig::default();
        assert_eq!(config.file_prefix, "chunked-uploader");
        assert_eq!(config.max_files, 5);
        assert!(!config.log_to_file);
        assert_eq!(config.log_level, "info");
    }
}
