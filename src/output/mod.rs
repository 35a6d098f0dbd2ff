//! Terminal output for the flatmirror CLI.
//!
//! One-line command results go to stderr so stdout stays free for the change
//! history and the `status` report. `--quiet` silences results but never
//! warnings or errors.

pub mod history;

use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};

pub use history::{ChangeHistory, StatusBoard};

/// Set by `--quiet`
static QUIET: AtomicBool = AtomicBool::new(false);

/// Silence result lines and the echoed change history
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

#[must_use]
pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Result of a command that finished normally, in green
pub fn success(message: &str) {
    if !is_quiet() {
        eprintln!("{}", message.green());
    }
}

/// Degraded but non-fatal result, in bold yellow
pub fn warning(message: &str) {
    eprintln!("{}", message.yellow().bold());
}

/// Fatal error with its full context chain
pub fn error(err: &anyhow::Error) {
    eprintln!("{} {err:#}", "Error:".red().bold());
}
