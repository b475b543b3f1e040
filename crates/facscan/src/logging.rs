//! Console and audit-log output.
//!
//! The audit log is one append-only text file per day,
//! `{log_directory}/facscan-{YYYY-MM-DD}.log`, every line starting with a
//! `[YYYY-MM-DD HH:MM:SS]` local timestamp.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, NaiveDate};
use thiserror::Error;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to create log directory '{path}': {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to install logger: {0}")]
    Install(String),
}

/// `[2024-06-01 10:30:00]`
pub struct BracketedLocalTime;

impl FormatTime for BracketedLocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "[{}]", Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Append-only log file that switches to a new file when the date changes.
pub struct DailyLogFile {
    directory: PathBuf,
    current: Mutex<Option<(NaiveDate, File)>>,
}

impl DailyLogFile {
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self, LoggingError> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory).map_err(|e| LoggingError::Directory {
            path: directory.clone(),
            source: e,
        })?;

        Ok(Self {
            directory,
            current: Mutex::new(None),
        })
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.directory
            .join(format!("facscan-{}.log", date.format("%Y-%m-%d")))
    }

    fn append(&self, date: NaiveDate, buf: &[u8]) -> io::Result<()> {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let stale = !matches!(current.as_ref(), Some((open_date, _)) if *open_date == date);
        if stale {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path_for(date))?;
            *current = Some((date, file));
        }

        match current.as_mut() {
            Some((_, file)) => file.write_all(buf),
            None => Ok(()),
        }
    }
}

pub struct DailyLogWriter<'a> {
    log: &'a DailyLogFile,
}

impl Write for DailyLogWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.log.append(Local::now().date_naive(), buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for DailyLogFile {
    type Writer = DailyLogWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        DailyLogWriter { log: self }
    }
}

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber: stderr plus the daily audit log.
///
/// `RUST_LOG` wins over `verbosity` when set. Records from the `log` crate
/// are forwarded too.
pub fn init(log_directory: &Path, verbosity: u8) -> Result<(), LoggingError> {
    let audit_log = DailyLogFile::new(log_directory)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(audit_log)
                .with_timer(BracketedLocalTime)
                .with_ansi(false),
        );

    tracing_log::LogTracer::init().map_err(|e| LoggingError::Install(e.to_string()))?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| LoggingError::Install(e.to_string()))?;

    Ok(())
}
