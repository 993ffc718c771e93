//! Tracing setup: a human-readable stderr stream for whoever runs the hub,
//! plus a daily-rolling file in either text or JSON lines.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "agent-matrix.log";
const DEFAULT_DIRECTIVES: &str = "info,agent_matrix=debug";

/// Layout of the log file. The console is always plain text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Where and how to write logs.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Overrides the per-user data directory.
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
}

/// Keeps the file writer alive; dropping it flushes pending lines.
pub struct LogGuard {
    dir: PathBuf,
    _file: WorkerGuard,
}

impl LogGuard {
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the built-in directives.
pub fn init(options: &LogOptions) -> Result<LogGuard> {
    let dir = resolve_log_dir(options)?;
    let (writer, guard) = open_file_writer(&dir)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let (json_file, text_file) = match options.format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_current_span(true)
                    .with_span_list(false),
            ),
            None,
        ),
        LogFormat::Text => (
            None,
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            ),
        ),
    };

    let console = fmt::layer().with_writer(std::io::stderr).with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(json_file)
        .with(text_file)
        .with(console)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(dir = %dir.display(), format = ?options.format, "Logging initialized");

    Ok(LogGuard { dir, _file: guard })
}

/// The explicit directory, or `<data dir>/logs`.
pub fn resolve_log_dir(options: &LogOptions) -> Result<PathBuf> {
    if let Some(dir) = &options.dir {
        return Ok(dir.clone());
    }

    let dirs = directories::ProjectDirs::from("com", "agent-matrix", "agent-matrix")
        .context("could not determine the data directory")?;
    Ok(dirs.data_dir().join("logs"))
}

fn open_file_writer(dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

/// Console-only subscriber for tests. Safe to call repeatedly.
#[cfg(test)]
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_dir_wins() {
        let options = LogOptions {
            dir: Some(PathBuf::from("/var/log/agent-matrix")),
            format: LogFormat::Json,
        };
        assert_eq!(
            resolve_log_dir(&options).unwrap(),
            PathBuf::from("/var/log/agent-matrix")
        );
    }

    #[test]
    fn test_file_writer_creates_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("nested").join("logs");

        let (_writer, guard) = open_file_writer(&dir).unwrap();
        assert!(dir.is_dir());
        drop(guard);
    }
}
