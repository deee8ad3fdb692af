//! Crate-wide error taxonomy, the `Res<T>` alias, and the leveled logger —
//! built the way the teacher crate bundles its own `CrawnError` and `Log`
//! trait together in one `error.rs`.

use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use strip_ansi_escapes::strip_str;
use time::macros::format_description;
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
    sync::{Mutex, OnceCell},
};

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    #[error(transparent)]
    UrlParsing(#[from] url::ParseError),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Regex(#[from] regex::Error),
    #[error(transparent)]
    Handler(#[from] crate::matcher::HandlerError),
    #[error(transparent)]
    DepthInvariant(#[from] crate::entity::DepthInvariantError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    FileScan(#[from] FileScanError),
}

pub type Res<T> = Result<T, ScraperError>;

/// Invalid CLI combinations, unparseable status ranges, a missing seed
/// source — anything that should abort the process before any crawling
/// starts.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("one of -u/--url, -f/--url-file, -l/--local must be provided")]
    NoSeedSource,
    #[error("invalid status range: {0:?}")]
    InvalidStatusRange(String),
    #[error("output file extension must be one of: {0:?}")]
    BadOutputExtension(String),
    #[error("failed to load config file {path}: {message}")]
    LoadFailure { path: String, message: String },
}

/// Raised by the local-file scanner when a target path is missing or is a
/// directory when a file was expected.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FileScanError {
    #[error("file does not exist: {0}")]
    NotFound(String),
    #[error("expected a file, got a directory: {0}")]
    IsDirectory(String),
}

/// Log levels, low to high. `Debug` is suppressed unless the run was
/// started with `--debug` / `loglevel: debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Fatal,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Debug => "[DEBUG]",
            Level::Info => "[INFO]",
            Level::Warn => "[WARN]",
            Level::Fatal => "[FATAL]",
        }
    }
}

static LOGGER: OnceCell<Option<Mutex<File>>> = OnceCell::const_new();
static LOG_PATH: OnceCell<Option<PathBuf>> = OnceCell::const_new();
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Configure the logger once, at process start. Safe to call more than
/// once; only the first call takes effect, matching `OnceCell` semantics.
pub fn configure(log_path: Option<PathBuf>, debug: bool) {
    let _ = LOG_PATH.set(log_path);
    DEBUG_ENABLED.store(debug, Ordering::SeqCst);
}

pub fn debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::SeqCst)
}

async fn init_logger() -> &'static Option<Mutex<File>> {
    LOGGER
        .get_or_init(async || {
            let path = LOG_PATH.get().cloned().flatten();
            if let Some(path) = path {
                match OpenOptions::new()
                    .write(true)
                    .truncate(true)
                    .create(true)
                    .open(&path)
                    .await
                {
                    Ok(file) => Some(Mutex::new(file)),
                    Err(err) => {
                        eprintln!(
                            "{} Failed to open log file {}: {err}",
                            "[FATAL]".red().bold(),
                            path.to_string_lossy().red().bold()
                        );
                        None
                    }
                }
            } else {
                None
            }
        })
        .await
}

const LOG_TIMESTAMP_FORMAT: &[time::format_description::BorrowedFormatItem] = format_description!(
    "[year]-[month padding:zero]-[day padding:zero] [hour]:[minute]:[second].[subsecond digits:3]"
);

fn timestamp() -> String {
    time::OffsetDateTime::now_utc()
        .to_offset(time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC))
        .format(&LOG_TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| "????-??-?? ??:??:??".to_string())
}

/// Write a leveled log line to the configured log file, or colorized
/// stderr when no log file is configured. `Debug` lines are dropped unless
/// [`configure`] was called with `debug = true`.
pub async fn log(level: Level, message: &str) {
    if level == Level::Debug && !debug_enabled() {
        return;
    }
    let ts = timestamp();
    if let Some(file) = init_logger().await {
        let mut wtr = file.lock().await;
        let line = format!("{} {}:\n{}\n\n", ts, level.label(), strip_str(message));
        let _ = wtr.write_all(line.as_bytes()).await;
        let _ = wtr.flush().await;
    } else {
        let colored_level = match level {
            Level::Debug => level.label().blue().to_string(),
            Level::Info => level.label().green().to_string(),
            Level::Warn => level.label().yellow().to_string(),
            Level::Fatal => level.label().red().bold().to_string(),
        };
        eprintln!("{} {}:\n{}\n", ts.bright_black(), colored_level, message);
    }
}

pub async fn debug(message: impl AsRef<str>) {
    log(Level::Debug, message.as_ref()).await;
}
pub async fn info(message: impl AsRef<str>) {
    log(Level::Info, message.as_ref()).await;
}
pub async fn warn(message: impl AsRef<str>) {
    log(Level::Warn, message.as_ref()).await;
}
pub async fn fatal(message: impl AsRef<str>) {
    log(Level::Fatal, message.as_ref()).await;
}

/// Extension trait mirroring the teacher's `Log<T>`: swallow an error into
/// a log line, yielding `None` in its place so the caller can `continue`.
pub trait LogErr<T> {
    async fn log_err(self, level: Level) -> Option<T>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    async fn log_err(self, level: Level) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                log(level, &e.to_string()).await;
                None
            }
        }
    }
}
