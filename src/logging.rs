//! Console and rotating-file logging built on `tracing-subscriber`.

use crate::config::Config;
use crate::error::{AnalyzerError, Result};
use chrono::Local;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Name of the active log file inside the log directory
pub const LOG_FILE_NAME: &str = "app.log";
/// Size at which the log file is rotated
pub const MAX_LOG_BYTES: u64 = 5_000_000;
/// Number of rotated files kept next to the active one
pub const LOG_BACKUPS: usize = 3;

const FILE_FILTER: &str = "debug,hyper=info,h2=info,reqwest=info,tower=info";

/// Initializes logging for the service
///
/// Console output goes to stderr at `RUST_LOG` or `config.log_level`;
/// everything from debug up is also appended to `log_dir/app.log`.
pub fn init(config: &Config) -> Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| AnalyzerError::Logging(format!("Invalid log level {:?}: {}", config.log_level, e)))?;

    let file = RotatingFile::open(config.log_dir.join(LOG_FILE_NAME), MAX_LOG_BYTES, LOG_BACKUPS)?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_timer(LogTimer)
        .with_target(false)
        .with_writer(io::stderr)
        .with_filter(console_filter);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_timer(LogTimer)
        .with_target(false)
        .with_ansi(false)
        .with_writer(file)
        .with_filter(EnvFilter::new(FILE_FILTER));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AnalyzerError::Logging(e.to_string()))
}

/// Timestamps formatted as `%Y-%m-%d %H:%M:%S` in local time
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTimer;

impl FormatTime for LogTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Append-only log file that rotates once it reaches a size limit
///
/// On rotation `app.log.N-1` becomes `app.log.N`, the oldest backup is
/// dropped and writing continues in a fresh `app.log`.
pub struct RotatingFile {
    inner: Mutex<RotatingState>,
}

struct RotatingState {
    path: PathBuf,
    file: File,
    size: u64,
    max_bytes: u64,
    backups: usize,
}

impl RotatingFile {
    /// Opens (or creates) `path` for appending, creating its directory
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = open_append(&path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            inner: Mutex::new(RotatingState { path, file, size, max_bytes, backups }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RotatingState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RotatingState {
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.backups == 0 {
            self.file = File::create(&self.path)?;
            self.size = 0;
            return Ok(());
        }

        let oldest = backup_path(&self.path, self.backups);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..self.backups).rev() {
            let from = backup_path(&self.path, index);
            if from.exists() {
                fs::rename(&from, backup_path(&self.path, index + 1))?;
            }
        }
        fs::rename(&self.path, backup_path(&self.path, 1))?;

        self.file = open_append(&self.path)?;
        self.size = 0;
        Ok(())
    }
}

/// Exclusive handle used for a single log record
pub struct RotatingWriter<'a> {
    state: MutexGuard<'a, RotatingState>,
}

impl Write for RotatingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let state = &mut *self.state;
        if state.size > 0 && state.size + buf.len() as u64 > state.max_bytes {
            state.rotate()?;
        }
        let written = state.file.write(buf)?;
        state.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriter { state: self.lock() }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn backup_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}", index));
    PathBuf::from(name)
}
