//! Subscriber setup for the binary
//!
//! Two outputs:
//! - Console: stdout, with colors
//! - File: appended to a single log file through a non-blocking writer
//!
//! Both honor `RUST_LOG` and default to `info`.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

static DEFAULT_LOG_FILE_NAME: &str = ".backuper.log";
static DEFAULT_LOG_LEVEL: &str = "info";

/// `$HOME/.backuper.log`, or `./.backuper.log` without a home directory
pub fn default_log_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_LOG_FILE_NAME)
}

/// Installs the console and file layers.
///
/// Keep the returned guard alive until exit; dropping it flushes the file.
pub fn init_logging(log_file: &Path) -> Result<LogGuard> {
    let (dir, file_name) = split_log_path(log_file)?;
    std::fs::create_dir_all(&dir)
        .map_err(Error::from)
        .add_msg(format!("Create log directory {:?} failed", dir))?;

    let file_appender = tracing_appender::rolling::never(&dir, file_name);
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_filter(env_filter());

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_filter(env_filter());

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(std::io::Error::other)?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// Console-only logging, for when the log file cannot be opened
pub fn init_console_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

fn split_log_path(log_file: &Path) -> Result<(PathBuf, &std::ffi::OsStr)> {
    let file_name = log_file.file_name().ok_or_else(|| {
        std::io::Error::other(format!("Log file path {:?} has no file name", log_file))
    })?;
    let dir = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, file_name))
}

/// Keeps the non-blocking file writer alive
pub struct LogGuard {
    _file_guard: WorkerGuard,
}
