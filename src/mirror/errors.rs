use std::fmt;
use std::io;

/// Classified failure of a single destination I/O attempt
#[derive(Debug)]
pub enum IoFailure {
    /// Transient contention (locked file, permission denied, generic OS error)
    Retryable(io::Error),
    /// Failure that will not go away by waiting (source vanished)
    Terminal(io::Error),
}

impl IoFailure {
    /// Classify an I/O error from a copy attempt.
    ///
    /// A missing file means the source vanished mid-operation, which no amount
    /// of retrying will fix. Everything else, permission errors included, is
    /// treated as contention.
    #[must_use]
    pub fn classify(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::Terminal(err),
            _ => Self::Retryable(err),
        }
    }

    /// Check if this failure might succeed on retry
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// The underlying I/O error
    #[must_use]
    pub const fn io_error(&self) -> &io::Error {
        match self {
            Self::Retryable(err) | Self::Terminal(err) => err,
        }
    }

    /// Take the underlying I/O error
    #[must_use]
    pub fn into_io_error(self) -> io::Error {
        match self {
            Self::Retryable(err) | Self::Terminal(err) => err,
        }
    }

    /// Get a short description of the failure class
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Retryable(_) => "Transient I/O Error",
            Self::Terminal(_) => "Terminal I/O Error",
        }
    }
}

impl fmt::Display for IoFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.io_error())
    }
}

impl std::error::Error for IoFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.io_error())
    }
}

/// Outcome of a retried operation that did not succeed
#[derive(Debug)]
pub enum RetryError {
    /// Every attempt failed with a retryable error
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        last: io::Error,
    },
    /// An attempt failed with a terminal error; no further attempts were made
    Terminal(io::Error),
}

impl RetryError {
    /// Whether the operation gave up because the target was missing
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Terminal(err) => err.kind() == io::ErrorKind::NotFound,
            Self::Exhausted { .. } => false,
        }
    }
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { attempts, last } => {
                write!(f, "{last} (gave up after {attempts} attempts)")
            }
            Self::Terminal(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RetryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_terminal() {
        let failure = IoFailure::classify(io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(failure, IoFailure::Terminal(_)));
        assert!(!failure.should_retry());
    }

    #[test]
    fn test_permission_denied_is_retryable() {
        let failure = IoFailure::classify(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(failure.should_retry());
        assert_eq!(failure.error_type(), "Transient I/O Error");
    }

    #[test]
    fn test_generic_os_error_is_retryable() {
        let failure = IoFailure::classify(io::Error::other("sharing violation"));
        assert!(failure.should_retry());
    }

    #[test]
    fn test_retry_error_display() {
        let err = RetryError::Exhausted {
            attempts: 5,
            last: io::Error::other("locked"),
        };
        assert_eq!(err.to_string(), "locked (gave up after 5 attempts)");
        assert!(!err.is_not_found());
        assert!(RetryError::Terminal(io::Error::from(io::ErrorKind::NotFound)).is_not_found());
    }
}
