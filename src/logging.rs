//! Tracing configuration and log routing.
//!
//! Logs always go to stdout through a compact formatter. A second, non-blocking file layer is
//! added according to [`LogFile`]: resolved after the dotenv file is loaded, so
//! `FIREGATE_LOG_FILE` set in `--env-file` is honored, and `--log-file` wins over both.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable naming the log file.
pub const LOG_FILE_VAR: &str = "FIREGATE_LOG_FILE";

const DEFAULT_FILTER: &str = "info,tower_http=info";
const DEFAULT_DIRECTORY: &str = "logs";
const DEFAULT_PREFIX: &str = "firegate.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Destination of the file layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFile {
    /// Stdout only.
    Disabled,
    /// Append to a single file.
    Append(PathBuf),
    /// Rotate daily inside `directory`, files prefixed with `prefix`.
    Daily {
        /// Directory holding the rotated files.
        directory: PathBuf,
        /// File name prefix; the date is appended.
        prefix: String,
    },
}

impl LogFile {
    /// Resolve the destination from an explicit value (flag first, then environment).
    ///
    /// `off`, `none`, and `-` disable file logging; a blank or missing value selects daily
    /// rotation under `logs/`.
    pub fn resolve(value: Option<&str>) -> Self {
        match value.map(str::trim).filter(|value| !value.is_empty()) {
            None => Self::Daily {
                directory: PathBuf::from(DEFAULT_DIRECTORY),
                prefix: DEFAULT_PREFIX.to_string(),
            },
            Some(flag) if matches!(flag.to_ascii_lowercase().as_str(), "off" | "none" | "-") => {
                Self::Disabled
            }
            Some(path) => Self::Append(PathBuf::from(path)),
        }
    }

    /// Resolve from `--log-file`, falling back to `FIREGATE_LOG_FILE`.
    pub fn from_flag_or_env(flag: Option<&Path>) -> Self {
        match flag {
            Some(path) => Self::resolve(path.to_str()),
            None => Self::resolve(std::env::var(LOG_FILE_VAR).ok().as_deref()),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` controls filtering (default `info,tower_http=info`). The file writer guard lives
/// for the rest of the process.
pub fn init_tracing(log_file: &LogFile) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    match open_writer(log_file) {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
    tracing::debug!(destination = ?log_file, "Tracing initialized");
}

/// `None` when file logging is disabled or the destination cannot be opened.
fn open_writer(log_file: &LogFile) -> Option<NonBlocking> {
    let (writer, guard) = match log_file {
        LogFile::Disabled => return None,
        LogFile::Append(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty())
                && let Err(err) = std::fs::create_dir_all(parent)
            {
                eprintln!("Failed to create log directory {}: {err}", parent.display());
                return None;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .inspect_err(|err| eprintln!("Failed to open log file {}: {err}", path.display()))
                .ok()?;
            tracing_appender::non_blocking(file)
        }
        LogFile::Daily { directory, prefix } => {
            if let Err(err) = std::fs::create_dir_all(directory) {
                eprintln!("Failed to create {}: {err}", directory.display());
                return None;
            }
            tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, prefix))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(writer)
}
