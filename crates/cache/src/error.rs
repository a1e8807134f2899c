//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Underlying I/O error on the cache directory.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Not enough room for the file, either on the cache volume or within the
    /// cache's budget; nothing was written.
    #[display("insufficient space: {available} bytes available, {required} required")]
    Capacity { available: u64, required: u64 },
    /// Reading from the source failed part way; the partial file was
    /// discarded.
    #[display("transfer of {_0} failed")]
    CorruptTransfer(#[error(not(source))] String),
    /// A string that is not a cache key.
    #[display("invalid cache key: {_0}")]
    InvalidKey(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// A full disk may clear up after eviction or user action, but not
    /// immediately, so `Capacity` is not considered retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::CorruptTransfer(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_display() {
        let err = ErrorKind::Capacity { available: 10, required: 100 };
        assert_eq!(err.to_string(), "insufficient space: 10 bytes available, 100 required");
        assert!(!err.is_retryable());
    }
}
