//! Retry-wrapped destination I/O.
//!
//! Destination files can be briefly locked by editors, indexers or anti-virus
//! scanners. Every mutation of the destination directory goes through
//! [`RetryPolicy::run`], which retries transient failures a fixed number of
//! times with a fixed delay and gives up immediately on terminal ones.

use super::errors::{IoFailure, RetryError};
use crate::config::RetryConfig;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Filesystem primitives used by the sync engine
pub trait MirrorFs: Send {
    /// Copy `from` to `to`, overwriting `to` and preserving the modification time
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error of the copy
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove the file at `path`
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error of the removal
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// [`MirrorFs`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl MirrorFs for StdFs {
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        let metadata = fs::metadata(from)?;
        fs::copy(from, to)?;
        let mtime = filetime::FileTime::from_last_modification_time(&metadata);
        filetime::set_file_mtime(to, mtime)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Bounded fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts (at least one attempt is always made)
    pub attempts: u32,
    /// Delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(200),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            attempts: config.count,
            delay: Duration::from_millis(config.delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails terminally, or runs out of attempts
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Terminal`] on the first terminal failure and
    /// [`RetryError::Exhausted`] when every attempt failed transiently.
    pub fn run<T>(&self, mut op: impl FnMut() -> Result<T, IoFailure>) -> Result<T, RetryError> {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let failure = match op() {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            if !failure.should_retry() {
                return Err(RetryError::Terminal(failure.into_io_error()));
            }
            if attempt >= attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: failure.into_io_error(),
                });
            }
            debug!(attempt, kind = failure.error_type(), error = %failure, "Retrying");
            std::thread::sleep(self.delay);
        }
    }

    /// Copy a file with retries.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Terminal`] if the source is gone, otherwise
    /// [`RetryError::Exhausted`] once every attempt has failed.
    pub fn copy(&self, fs: &dyn MirrorFs, from: &Path, to: &Path) -> Result<(), RetryError> {
        self.run(|| fs.copy(from, to).map_err(IoFailure::classify))
    }

    /// Remove a file with retries. A file that is already absent counts as removed.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Exhausted`] once every attempt has failed.
    pub fn remove(&self, fs: &dyn MirrorFs, path: &Path) -> Result<(), RetryError> {
        self.run(|| match fs.remove(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(IoFailure::Retryable(err)),
        })
    }
}
