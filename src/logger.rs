//! Logging utilities with colored output.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - a numeric verbosity threshold shared by the whole run
//! - an optional plain-text log file mirroring every emitted line
//!
//! # Example
//!
//! ```ignore
//! // Shown at the default verbosity
//! log!("build"; "rendering {} items", count);
//!
//! // Shown only with `-vv`
//! log!(level = 2; "stale"; "{}: output missing", path);
//!
//! // Always shown, on stderr
//! log!("warn"; "{}: no title", path);
//! ```

use colored::{ColoredString, Colorize};
use crossterm::terminal::{Clear, ClearType, size};
use crossterm::execute;
use std::{
    fs::{File, OpenOptions},
    io::{Write, stderr, stdout},
    path::Path,
    sync::{
        Mutex, OnceLock,
        atomic::{AtomicU8, Ordering},
    },
};

/// Cached terminal width (fetched once on first use)
static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

/// Current verbosity threshold
static VERBOSITY: AtomicU8 = AtomicU8::new(1);

/// Optional log file, set once at startup
static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();

// ============================================================================
// Layout Constants
// ============================================================================
//
// Line format: "[module] message"
//               ^------^ ^-----^
//               prefix   message

/// Length of brackets around module name: "[]"
const BRACKET_LEN: usize = 2;
/// Space after prefix: "[module] " <- this space
const SPACE_AFTER_PREFIX: usize = 1;

/// Calculate total prefix length for a module name.
///
/// Returns: `module.len() + 3` (for `[`, `]`, and trailing space)
#[inline]
const fn calc_prefix_len(module_len: usize) -> usize {
    module_len + BRACKET_LEN + SPACE_AFTER_PREFIX
}

/// Get terminal width, cached after first call.
/// Falls back to 120 columns if detection fails.
fn get_terminal_width() -> u16 {
    *TERMINAL_WIDTH.get_or_init(|| size().map(|(w, _)| w).unwrap_or(120))
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix.
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// log!(level = 2; "module"; "only printed at -vv");
/// ```
#[macro_export]
macro_rules! log {
    (level = $level:expr; $module:expr; $($arg:tt)*) => {{
        $crate::logger::log_at($level, $module, &format!($($arg)*))
    }};
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log_at(1, $module, &format!($($arg)*))
    }};
}

// ============================================================================
// Setup
// ============================================================================

/// Set the verbosity threshold. `0` silences everything but warnings and errors.
pub fn set_verbosity(level: u8) {
    VERBOSITY.store(level, Ordering::Relaxed);
}

pub fn verbosity() -> u8 {
    VERBOSITY.load(Ordering::Relaxed)
}

/// Open (append) the log file. Only the first call has any effect.
pub fn set_log_file(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let _ = LOG_FILE.set(Mutex::new(file));
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Whether a module always surfaces regardless of verbosity.
#[inline]
fn is_diagnostic(module_lower: &str) -> bool {
    matches!(module_lower, "warn" | "error")
}

/// Log a message at the given verbosity level.
///
/// `warn` and `error` messages go to stderr and ignore the threshold.
/// Automatically truncates long single-line messages to fit terminal width.
pub fn log_at(level: u8, module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let diagnostic = is_diagnostic(&module_lower);

    if !diagnostic && level > verbosity() {
        return;
    }

    write_log_file(module, message);

    let prefix = colorize_prefix(module, &module_lower);
    let message = if message.contains('\n') {
        // Multiline output (e.g. command stderr) is never truncated
        message
    } else {
        let max_msg_len = (get_terminal_width() as usize).saturating_sub(calc_prefix_len(module.len()));
        truncate_str(message, max_msg_len)
    };

    if diagnostic {
        let mut stderr = stderr().lock();
        writeln!(stderr, "{prefix} {message}").ok();
        stderr.flush().ok();
    } else {
        let mut stdout = stdout().lock();
        execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
        writeln!(stdout, "{prefix} {message}").ok();
        stdout.flush().ok();
    }
}

fn write_log_file(module: &str, message: &str) {
    let Some(file) = LOG_FILE.get() else {
        return;
    };
    if let Ok(mut file) = file.lock() {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(file, "{stamp} [{module}] {message}").ok();
    }
}

/// Apply color to a module prefix based on module type.
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module_lower {
        "build" => prefix.bright_blue().bold(),
        "render" => prefix.bright_green().bold(),
        "warn" => prefix.bright_magenta().bold(),
        "error" => prefix.bright_red().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Truncate a string to fit within `max_len` bytes.
///
/// Ensures the result is valid UTF-8 by finding the nearest character boundary.
#[inline]
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    // Find the last valid UTF-8 boundary within max_len
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ============================================================================
// Tests
// ============================================================================
