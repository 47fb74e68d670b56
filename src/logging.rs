//! framecast logging utilities.
//!
//! Every log line is shaped like:
//!     <timestamp> [TAG][thread] message
//!
//! - stderr is the canonical sink; an optional append-only file sink mirrors it.
//! - `FRAMECAST_LOG_LEVEL` (`info` | `warn` | `error`) drops lines below that level.
//! - All call sites go through `logi!`, `logw!` or `loge!`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<Option<std::fs::File>>> = OnceLock::new();
static RUN_ID: OnceLock<String> = OnceLock::new();
static MIN_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Info = 0,
    Warn = 1,
    Error = 2,
}

impl Level {
    pub fn parse(s: &str) -> Option<Level> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            _ => None,
        }
    }
}

/// Initialize logging. Call once at startup.
/// - If `log_file` is Some, all log lines are appended to that path.
/// - Reads `FRAMECAST_LOG_LEVEL` for the minimum level.
///
/// Returns the run id.
pub fn init(log_file: Option<PathBuf>) -> String {
    let rid = RUN_ID
        .get_or_init(|| {
            // Short correlation id: time xor pid
            let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
            format!("{:08x}", (now.as_nanos() as u64) ^ (std::process::id() as u64))
        })
        .clone();

    if let Some(level) = std::env::var("FRAMECAST_LOG_LEVEL").ok().as_deref().and_then(Level::parse) {
        set_min_level(level);
    }

    let sink = LOG_FILE.get_or_init(|| Mutex::new(None));

    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => {
                if let Ok(mut guard) = sink.lock() {
                    *guard = Some(f);
                }
            }
            Err(e) => {
                log_line(Level::Warn, "LOG", &format!("failed to open log file {}: {e}", path.display()));
            }
        }
    }

    rid
}

/// Current run id (empty if init() wasn't called).
pub fn run_id() -> &'static str {
    RUN_ID.get().map(|s| s.as_str()).unwrap_or("")
}

pub fn set_min_level(level: Level) {
    MIN_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn enabled(level: Level) -> bool {
    level as u8 >= MIN_LEVEL.load(Ordering::Relaxed)
}

/// Timestamp used in logs: `YYYY-MM-DD HH:MM:SS.mmm`, local time when the offset is
/// known, UTC otherwise.
pub fn log_timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let Ok(fmt) = time::format_description::parse(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]",
    ) else {
        return "<time-format-error>".to_string();
    };
    now.format(&fmt).unwrap_or_else(|_| "<time-format-error>".to_string())
}

/// Best-effort thread name for log prefix.
pub fn log_thread_name() -> String {
    std::thread::current().name().unwrap_or("main").to_string()
}

pub fn format_line(tag: &str, msg: &str) -> String {
    format!("{} [{}][{}] {}", log_timestamp(), tag, log_thread_name(), msg)
}

/// Write one fully formatted line to stderr + optional file sink.
///
/// Public only so the exported macros can reach it.
#[doc(hidden)]
pub fn log_line(level: Level, tag: &str, msg: &str) {
    if !enabled(level) {
        return;
    }

    let line = format_line(tag, msg);

    eprintln!("{line}");

    if let Some(m) = LOG_FILE.get() {
        if let Ok(mut guard) = m.lock() {
            if let Some(f) = guard.as_mut() {
                let _ = writeln!(f, "{line}");
                let _ = f.flush();
            }
        }
    }
}

/// Info log
#[macro_export]
macro_rules! logi {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line($crate::logging::Level::Info, $tag, &msg);
    }};
}

/// Warning log
#[macro_export]
macro_rules! logw {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line($crate::logging::Level::Warn, $tag, &msg);
    }};
}

/// Error log
#[macro_export]
macro_rules! loge {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line($crate::logging::Level::Error, $tag, &msg);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_shape_is_timestamp_tag_thread_message() {
        let line = std::thread::Builder::new()
            .name("worker-7".into())
            .spawn(|| format_line("NDI", "hello"))
            .unwrap()
            .join()
            .unwrap();

        assert!(line.ends_with(" [NDI][worker-7] hello"), "{line}");
        // YYYY-MM-DD HH:MM:SS.mmm
        let ts = &line[..23];
        assert_eq!(ts.as_bytes()[4], b'-');
        assert_eq!(ts.as_bytes()[10], b' ');
        assert_eq!(ts.as_bytes()[19], b'.');
    }

    #[test]
    fn level_parsing() {
        assert_eq!(Level::parse("WARN"), Some(Level::Warn));
        assert_eq!(Level::parse("warning"), Some(Level::Warn));
        assert_eq!(Level::parse("error"), Some(Level::Error));
        assert_eq!(Level::parse("debug"), None);
        assert!(Level::Error > Level::Info);
    }
}
