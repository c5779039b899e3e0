//! Logging system initialization

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;

use crate::config::{LoggingConfig, StaticConfig};

const DEFAULT_LOG_NAME: &str = "shortener.log";

type LogWriter = Box<dyn std::io::Write + Send + Sync>;

fn make_writer(logging: &LoggingConfig) -> anyhow::Result<LogWriter> {
    let Some(log_file) = logging.file.as_deref().filter(|f| !f.is_empty()) else {
        return Ok(Box::new(std::io::stdout()));
    };

    if logging.enable_rotation {
        let path = Path::new(log_file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let prefix = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(DEFAULT_LOG_NAME)
            .trim_end_matches(".log");

        let appender = rolling::Builder::new()
            .rotation(rolling::Rotation::DAILY)
            .filename_prefix(prefix)
            .filename_suffix("log")
            .max_log_files(logging.max_backups as usize)
            .build(dir)
            .with_context(|| {
                format!("failed to create rolling log appender in {}", dir.display())
            })?;
        Ok(Box::new(appender))
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("failed to open log file {}", log_file))?;
        Ok(Box::new(file))
    }
}

/// Initialize the global tracing subscriber.
///
/// The returned guard must be kept alive until shutdown so buffered log lines
/// are flushed. `RUST_LOG` overrides the configured level when set.
pub fn init_logging(config: &StaticConfig) -> anyhow::Result<WorkerGuard> {
    let logging = &config.logging;
    let (writer, guard) = tracing_appender::non_blocking(make_writer(logging)?);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("invalid log level: {}", logging.level))?;

    let builder = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(filter)
        .with_level(true)
        .with_ansi(logging.file.as_ref().is_none_or(|f| f.is_empty()));

    let installed = if logging.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))?;

    Ok(guard)
}
