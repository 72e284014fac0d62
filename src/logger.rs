//! Session logger for the editor window.
//!
//! Every GUI launch truncates `perlerpad.log` in the platform data directory,
//! so the file only ever describes the most recent editing session:
//!
//!   Windows:  `%APPDATA%\PerlerPad\perlerpad.log`
//!   Linux:    `~/.local/share/PerlerPad/perlerpad.log`
//!   macOS:    `~/Library/Application Support/PerlerPad/perlerpad.log`
//!
//! Library code reports through `log_info!`, `log_warn!` and `log_err!`.
//! The CLI and the test suite never call [`init`], and there the macros cost
//! one atomic load and write nothing.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Severity tag written in front of every message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    /// Mirrored from the panic hook.
    Panic,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        })
    }
}

/// Path of the open session log, once [`init`] succeeded.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

pub fn is_enabled() -> bool {
    LOG_FILE.get().is_some()
}

/// Append a raw line.  A failed write is dropped; logging never aborts an edit.
pub fn write_line(line: &str) {
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Entry point of the `log_*!` macros.
pub fn write(level: Level, msg: &str) {
    if !is_enabled() {
        return;
    }
    write_line(&format_line(unix_secs(), level, msg));
}

/// `[HH:MM:SS] [LEVEL] message`, time of day in UTC.
pub fn format_line(unix_secs: u64, level: Level, msg: &str) -> String {
    format!(
        "[{:02}:{:02}:{:02}] [{}] {}",
        (unix_secs % 86_400) / 3_600,
        (unix_secs % 3_600) / 60,
        unix_secs % 60,
        level,
        msg
    )
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*))
    };
}

/// Open the session log in the platform data directory.  Call once, from
/// the GUI entry point.
pub fn init() {
    init_at(&data_dir().join("PerlerPad").join("perlerpad.log"));
}

/// Open (truncating) the log at `path` and hook panics into it.  Later calls
/// keep the first file.
pub fn init_at(path: &Path) {
    if is_enabled() {
        return;
    }
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = match OpenOptions::new().create(true).write(true).truncate(true).open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[logger] cannot open {}: {}", path.display(), e);
            return;
        }
    };
    let _ = LOG_PATH.set(path.to_path_buf());
    let _ = LOG_FILE.set(Mutex::new(file));

    write_line(&format!(
        "=== PerlerPad {} session (unix {}) ===",
        env!("CARGO_PKG_VERSION"),
        unix_secs()
    ));

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format_line(unix_secs(), Level::Panic, &info.to_string()));
        previous(info);
    }));
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_carry_time_of_day_and_level() {
        // 1970-01-02 13:04:05 UTC
        let secs = 86_400 + 13 * 3_600 + 4 * 60 + 5;
        assert_eq!(
            format_line(secs, Level::Warn, "palette missing"),
            "[13:04:05] [WARN] palette missing"
        );
    }

    #[test]
    fn macros_work_in_expression_position() {
        let outcome: Result<u8, &str> = Err("bad");
        let value = match outcome {
            Ok(v) => v,
            Err(e) => {
                crate::log_warn!("ignored: {}", e);
                0
            }
        };
        match value {
            0 => crate::log_info!("zero"),
            _ => crate::log_err!("non-zero"),
        }
        assert_eq!(value, 0);
    }
}
