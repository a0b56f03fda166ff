//! Process-wide logging: `env_logger` on stderr, optionally teed into a
//! size- and day-rotated file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, TimeDelta};
use env_logger::{Target, WriteStyle};
use humansize::{format_size, BINARY};
use log::{warn, LevelFilter};
use walkdir::WalkDir;

pub const LOG_FILE_NAME: &str = "previewmaid.log";

/// When to rotate the log file and how many old files to keep.
#[derive(Debug, Clone, Copy)]
pub struct RotationPolicy {
    pub max_bytes: u64,
    pub max_backups: usize,
    pub max_age: TimeDelta,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            max_backups: 5,
            max_age: TimeDelta::days(7),
        }
    }
}

/// Where log lines end up after [`init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Console,
    ConsoleAndFile(PathBuf),
}

/// Install the global logger. Call once, before anything logs.
///
/// `RUST_LOG` still overrides the level chosen by `debug`.
pub fn init(debug: bool, log_dir: Option<&Path>) -> Result<LogSink> {
    let policy = RotationPolicy::default();
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(if debug { LevelFilter::Debug } else { LevelFilter::Info })
        // HTTP internals are far too chatty at debug
        .filter_module("hyper", LevelFilter::Info)
        .filter_module("hyper_util", LevelFilter::Info)
        .filter_module("reqwest", LevelFilter::Info)
        .filter_module("rustls", LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {} - {}",
            buf.timestamp_seconds(),
            record.target(),
            record.level(),
            record.args()
        )
    });

    let mut missing_dir = None;
    let sink = match log_dir {
        Some(dir) if dir.is_dir() => {
            let file = RotatingFile::open(dir, policy)
                .with_context(|| format!("Failed to open log file in {}", dir.display()))?;
            let path = file.path();
            builder
                .write_style(WriteStyle::Never)
                .target(Target::Pipe(Box::new(Tee {
                    console: io::stderr(),
                    file,
                })));
            LogSink::ConsoleAndFile(path)
        }
        Some(dir) => {
            missing_dir = Some(dir.to_path_buf());
            LogSink::Console
        }
        None => LogSink::Console,
    };

    builder.try_init().context("Failed to initialise logger")?;

    if let Some(dir) = missing_dir {
        warn!(
            "Log directory {} does not exist, logging to console only",
            dir.display()
        );
    }
    if let LogSink::ConsoleAndFile(path) = &sink {
        log::info!(
            "Logging to {} (rotating at {} or daily, keeping {} backups for {} days)",
            path.display(),
            format_size(policy.max_bytes, BINARY),
            policy.max_backups,
            policy.max_age.num_days()
        );
    }
    Ok(sink)
}

/// Writes every line to the console and to the log file.
struct Tee<F: Write> {
    console: io::Stderr,
    file: F,
}

impl<F: Write> Write for Tee<F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.console.write_all(buf)?;
        // A full disk must not silence console logging.
        let _ = self.file.write_all(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.console.flush()?;
        let _ = self.file.flush();
        Ok(())
    }
}

/// Append-only log file rotated by size and by calendar day.
///
/// Backups are named `previewmaid.log.1` (newest) up to
/// `previewmaid.log.<max_backups>`.
pub struct RotatingFile {
    dir: PathBuf,
    policy: RotationPolicy,
    file: File,
    size: u64,
    opened_on: NaiveDate,
}

impl RotatingFile {
    pub fn open(dir: &Path, policy: RotationPolicy) -> io::Result<Self> {
        let path = dir.join(LOG_FILE_NAME);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let meta = file.metadata()?;
        let opened_on = meta
            .modified()
            .map(|m| DateTime::<Local>::from(m).date_naive())
            .unwrap_or_else(|_| Local::now().date_naive());
        Ok(Self {
            dir: dir.to_path_buf(),
            policy: RotationPolicy {
                max_backups: policy.max_backups.max(1),
                ..policy
            },
            file,
            size: meta.len(),
            opened_on,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(LOG_FILE_NAME)
    }

    fn backup_path(&self, n: usize) -> PathBuf {
        self.dir.join(format!("{}.{}", LOG_FILE_NAME, n))
    }

    fn needs_rotation(&self, incoming: usize, today: NaiveDate) -> bool {
        if self.size == 0 {
            return false;
        }
        today != self.opened_on || self.size + incoming as u64 > self.policy.max_bytes
    }

    fn rotate(&mut self, today: NaiveDate) -> io::Result<()> {
        self.file.flush()?;
        for n in (1..self.policy.max_backups).rev() {
            let from = self.backup_path(n);
            if from.exists() {
                fs::rename(&from, self.backup_path(n + 1))?;
            }
        }
        fs::rename(self.path(), self.backup_path(1))?;
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path())?;
        self.size = 0;
        self.opened_on = today;
        self.prune();
        Ok(())
    }

    /// Delete backups past the retention count or older than the maximum age.
    fn prune(&self) {
        let now = std::time::SystemTime::now();
        let max_age = self.policy.max_age.to_std().unwrap_or_default();
        let prefix = format!("{}.", LOG_FILE_NAME);

        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let name = entry.file_name().to_string_lossy();
            let index = match name
                .strip_prefix(&prefix)
                .and_then(|suffix| suffix.parse::<usize>().ok())
            {
                Some(i) => i,
                None => continue,
            };
            let too_old = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|m| now.duration_since(m).ok())
                .map(|age| age > max_age)
                .unwrap_or(false);
            if index > self.policy.max_backups || too_old {
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let today = Local::now().date_naive();
        if self.needs_rotation(buf.len(), today) {
            self.rotate(today)?;
        }
        let n = self.file.write(buf)?;
        self.size += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
