//! Logging setup
//!
//! CLI commands log to stderr at `warn` unless `RUST_LOG` says otherwise.
//! The daemon logs to stderr in the foreground, and otherwise to
//! `$XDG_DATA_HOME/devchooser/daemon.log` through a size-rotating appender
//! driven by a `tracing_appender` worker thread.

use color_eyre::eyre::{ContextCompat, Result};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

const LOG_FILE_NAME: &str = "daemon.log";
const MAX_LOG_SIZE: u64 = 1_000_000;

/// Directory holding the daemon log
///
/// # Errors
/// Returns an error if the data directory cannot be determined.
pub fn log_dir() -> Result<PathBuf> {
    Ok(dirs::data_dir()
        .context("Could not determine data directory")?
        .join("devchooser"))
}

/// Path of the active daemon log file
///
/// # Errors
/// Returns an error if the data directory cannot be determined.
pub fn log_file_path() -> Result<PathBuf> {
    Ok(log_dir()?.join(LOG_FILE_NAME))
}

/// Logging for CLI commands: stderr, `warn` by default
pub fn init_cli() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
}

/// Logging for the daemon.
///
/// The returned guard flushes the log file on drop and must be kept alive
/// for the daemon's lifetime.
///
/// # Errors
/// Returns an error if the log directory cannot be determined.
pub fn init_daemon(log_level: &str, foreground: bool) -> Result<Option<WorkerGuard>> {
    // Only our crate logs at the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("devchooser={log_level}")));

    if foreground {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
        return Ok(None);
    }

    let appender = RotatingFileAppender::new(log_dir()?, LOG_FILE_NAME, MAX_LOG_SIZE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(Some(guard))
}

/// A file appender that rotates logs based on size.
///
/// Keeps two files: `current` and `current.old`. When `current` reaches
/// `max_size_bytes` it replaces the backup and a fresh file is started.
/// A log file deleted from under the daemon is re-created on the next
/// write. Files are created with 0o600 permissions.
pub struct RotatingFileAppender {
    path: PathBuf,
    backup_path: PathBuf,
    max_size_bytes: u64,
    file: Option<File>,
    size: u64,
}

impl RotatingFileAppender {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, filename: &str, max_size_bytes: u64) -> Self {
        let dir = dir.into();
        Self {
            path: dir.join(filename),
            backup_path: dir.join(format!("{filename}.old")),
            max_size_bytes,
            file: None,
            size: 0,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    fn open(path: &Path, truncate: bool) -> io::Result<File> {
        let mut options = fs::OpenOptions::new();
        options.create(true);
        if truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        #[cfg(unix)]
        {
            options.mode(0o600);
        }
        options.open(path)
    }

    /// Open (or re-open after external deletion) the current file
    fn current(&mut self) -> io::Result<&mut File> {
        if !self.path.exists() {
            self.file = None;
        }
        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = Self::open(&self.path, false)?;
            self.size = file.metadata()?.len();
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file unavailable"))
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file = None;
        if self.path.exists() {
            fs::rename(&self.path, &self.backup_path)?;
        }
        self.file = Some(Self::open(&self.path, true)?);
        self.size = 0;
        Ok(())
    }
}

impl Write for RotatingFileAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.current()?;
        if self.size >= self.max_size_bytes
            && let Err(e) = self.rotate()
        {
            eprintln!("Failed to rotate log file: {e}");
        }

        let file = self.current()?;
        file.write_all(buf)?;
        self.size += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}
