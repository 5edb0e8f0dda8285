//! Console log plus a daily-rolling file under the logs directory.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const FILE_PREFIX: &str = "app";
const FILE_SUFFIX: &str = "log";
const RETAINED_FILES: usize = 7;

/// `app.<date>.log`, rotated daily, last seven days kept.
pub fn file_appender(logs_dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create log directory {:?}", logs_dir))?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(FILE_PREFIX)
        .filename_suffix(FILE_SUFFIX)
        .max_log_files(RETAINED_FILES)
        .build(logs_dir)
        .with_context(|| format!("Failed to open log file in {:?}", logs_dir))
}

/// Installs the global subscriber. The console honours `RUST_LOG` (default
/// `info`); the file always records INFO and above.
///
/// Hold the returned guard until exit, dropping it flushes the file writer.
pub fn init(logs_dir: &Path) -> Result<WorkerGuard> {
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender(logs_dir)?);

    let console = fmt::layer().with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    let file = fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(LevelFilter::INFO);

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install log subscriber")?;
    Ok(guard)
}
