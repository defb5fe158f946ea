//! File logging for abacus processes.
//!
//! Log levels:
//! - ERROR: Failures that abort a command (bind errors, unreachable orchestrator)
//! - WARN: Recoverable surprises (failed computations, stale results, expired leases)
//! - INFO: Lifecycle events (startup, submissions, completed expressions)
//! - DEBUG: Scheduling traces (task creation, dispatch, result application)
//! - TRACE: Empty polls and other per-tick noise
//!
//! Each process writes to `~/.abacus/<role>.log`, so a server and its agents
//! can run side by side on one machine. `--debug` or `ABACUS_DEBUG=1` raises
//! the level to DEBUG; `ABACUS_LOG=<level>` picks any level explicitly.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

struct Sink {
    role: String,
    path: PathBuf,
}

static SINK: OnceLock<Sink> = OnceLock::new();
static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown log level '{}'", wanted))
    }
}

/// Start logging to `~/.abacus/<role>.log`.
pub fn init(role: &str) {
    init_with_debug(role, false);
}

/// Start logging, forcing DEBUG when `debug` is set.
///
/// The log file is truncated. Only the first call picks the file; later
/// calls still adjust the level.
pub fn init_with_debug(role: &str, debug: bool) {
    let env = |key: &str| std::env::var(key).ok();
    LEVEL.store(resolve_level(debug, env) as u8, Ordering::SeqCst);

    let Some(dir) = dirs::home_dir().map(|home| home.join(".abacus")) else {
        return;
    };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let path = dir.join(format!("{}.log", role));
    if std::fs::write(&path, "").is_ok() {
        let _ = SINK.set(Sink {
            role: role.to_string(),
            path,
        });
    }
}

/// Level chosen from the `--debug` flag and the environment.
///
/// `ABACUS_LOG` wins when it names a level; otherwise debug mode means
/// DEBUG and everything else INFO.
fn resolve_level<F>(debug: bool, env: F) -> LogLevel
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(level) = env("ABACUS_LOG").and_then(|v| v.parse().ok()) {
        return level;
    }
    let env_debug = env("ABACUS_DEBUG")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if debug || env_debug {
        LogLevel::Debug
    } else {
        LogLevel::Info
    }
}

/// Path of the active log file, if logging was initialized.
pub fn log_path() -> Option<&'static PathBuf> {
    SINK.get().map(|sink| &sink.path)
}

/// Whether DEBUG lines are being written.
pub fn is_debug() -> bool {
    get_level() >= LogLevel::Debug
}

pub fn get_level() -> LogLevel {
    let raw = LEVEL.load(Ordering::Relaxed) as usize;
    LogLevel::ALL[raw.min(LogLevel::ALL.len() - 1)]
}

/// Append one line at `level`. Dropped until [`init`] has chosen a file.
pub fn log_at(level: LogLevel, msg: &str) {
    if level > get_level() {
        return;
    }
    let Some(sink) = SINK.get() else {
        return;
    };
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&sink.path) {
        let _ = writeln!(file, "{}", format_line(&sink.role, level, msg));
    }
}

fn format_line(role: &str, level: LogLevel, msg: &str) -> String {
    format!(
        "{} {:<5} {}: {}",
        chrono::Local::now().format("%H:%M:%S%.3f"),
        level.as_str(),
        role,
        msg
    )
}

pub fn error(msg: &str) {
    log_at(LogLevel::Error, msg);
}

pub fn warn(msg: &str) {
    log_at(LogLevel::Warn, msg);
}

pub fn info(msg: &str) {
    log_at(LogLevel::Info, msg);
}

pub fn debug(msg: &str) {
    log_at(LogLevel::Debug, msg);
}

pub fn trace(msg: &str) {
    log_at(LogLevel::Trace, msg);
}

/// INFO-level `format!`-style logging.
#[macro_export]
macro_rules! alog {
    ($($arg:tt)*) => {
        $crate::log::info(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! alog_error {
    ($($arg:tt)*) => {
        $crate::log::error(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! alog_warn {
    ($($arg:tt)*) => {
        $crate::log::warn(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! alog_debug {
    ($($arg:tt)*) => {
        $crate::log::debug(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! alog_trace {
    ($($arg:tt)*) => {
        $crate::log::trace(&format!($($arg)*))
    };
}
