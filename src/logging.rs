//! Process-wide logging policy
//!
//! The runtime logs through the `log` facade. This module installs the
//! backing logger: a single policy object holding a reporting threshold, a
//! console sink (stderr, colorized per level) and an optional file sink.
//! File records carry a `YYYY-MM-DD HH:MM:SS.uuuuuu` timestamp. The policy
//! is process-wide state, initialized once at startup; level and file sink
//! can be adjusted afterwards through the accessors below.

use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

/// The log levels understood by the radio runtime.
///
/// `Fatal` exists for configuration compatibility; the `log` facade has no
/// level above error, so fatal reporting is folded onto `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl LogLevel {
    /// Parse a level name, case-insensitively. Unknown names fall back to
    /// `Info` after a warning, mirroring the behavior of `set_level`.
    pub fn parse(name: &str) -> Option<LogLevel> {
        match name.to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            "fatal" => Some(LogLevel::Fatal),
            _ => None,
        }
    }

    fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warning => LevelFilter::Warn,
            // Fatal messages are emitted at error level
            LogLevel::Error | LogLevel::Fatal => LevelFilter::Error,
        }
    }

    fn from_index(i: usize) -> LogLevel {
        match i {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warning,
            3 => LogLevel::Error,
            _ => LogLevel::Fatal,
        }
    }
}

/// ANSI color for a level on the console sink
fn color(level: Level) -> &'static str {
    match level {
        Level::Trace | Level::Debug => "\x1b[36m",
        Level::Info => "\x1b[0m",
        Level::Warn => "\x1b[33m",
        Level::Error => "\x1b[31m",
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Trace | Level::Debug => "[DEBUG]  ",
        Level::Info => "[INFO]   ",
        Level::Warn => "[WARNING]",
        Level::Error => "[ERROR]  ",
    }
}

struct PolicyLogger {
    level: AtomicUsize,
    file: Mutex<Option<File>>,
}

impl PolicyLogger {
    fn level(&self) -> LogLevel {
        LogLevel::from_index(self.level.load(Ordering::Relaxed))
    }
}

impl log::Log for PolicyLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level().to_filter()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = level_tag(record.level());
        let line = format!("{} {}", tag, record.args());

        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}{}\x1b[0m", color(record.level()), line);
        let _ = err.flush();

        if let Ok(mut guard) = self.file.lock() {
            if let Some(file) = guard.as_mut() {
                let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.6f");
                let _ = writeln!(file, "{} {}", stamp, line);
                let _ = file.flush();
            }
        }
    }

    fn flush(&self) {}
}

static POLICY: OnceLock<&'static PolicyLogger> = OnceLock::new();

fn policy() -> &'static PolicyLogger {
    POLICY.get_or_init(|| {
        let logger: &'static PolicyLogger = Box::leak(Box::new(PolicyLogger {
            level: AtomicUsize::new(LogLevel::Info as usize),
            file: Mutex::new(None),
        }));
        // Ignore the error if a logger was already installed; the policy
        // accessors still work against our instance.
        let _ = log::set_logger(logger);
        log::set_max_level(LevelFilter::Debug);
        logger
    })
}

/// Install the process-wide logger. Idempotent.
pub fn init() {
    let _ = policy();
}

/// Set the reporting threshold. Anything below the threshold is dropped.
pub fn set_level(level: LogLevel) {
    policy().level.store(level as usize, Ordering::Relaxed);
}

/// Set the reporting threshold from a level name, case-insensitively.
/// An unknown name logs a warning and falls back to `Info`.
pub fn set_level_str(name: &str) {
    match LogLevel::parse(name) {
        Some(level) => set_level(level),
        None => {
            set_level(LogLevel::Info);
            log::warn!("unknown logging level '{}', using info", name);
        }
    }
}

/// Current reporting threshold
pub fn level() -> LogLevel {
    policy().level()
}

/// Attach a log file sink. Records are appended with microsecond timestamps.
pub fn set_log_file(path: &Path) -> std::io::Result<()> {
    let file = File::options().create(true).append(true).open(path)?;
    if let Ok(mut guard) = policy().file.lock() {
        *guard = Some(file);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse_is_case_insensitive() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("Warning"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse("fatal"), Some(LogLevel::Fatal));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    // One test touches the process-wide threshold so the assertions
    // cannot race each other
    #[test]
    fn test_threshold_updates() {
        init();
        set_level(LogLevel::Error);
        assert_eq!(level(), LogLevel::Error);
        set_level_str("nonsense");
        assert_eq!(level(), LogLevel::Info);
    }
}
