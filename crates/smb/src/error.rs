//! SMB Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! The split between [`ErrorKind::Transport`] and [`ErrorKind::Auth`] is load
//! bearing: protocol detection treats an authentication failure as proof that
//! the dialect negotiated fine, and only a transport failure as proof that it
//! did not.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::time::Duration;

/// An SMB error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for SMB operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Connection refused, name resolution failed, or dialect negotiation
    /// failed. Shown to users as "server unreachable".
    #[display("transport error: {_0}")]
    Transport(#[error(not(source))] String),
    /// Credentials were rejected after the handshake completed. Shown to users
    /// as "check credentials".
    #[display("authentication rejected for {_0}")]
    Auth(#[error(not(source))] String),
    /// Share, file or directory does not exist.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Access denied on an existing share, file or directory.
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),
    /// Tried to list something that cannot be listed.
    #[display("not a directory: {_0}")]
    NotADirectory(#[error(not(source))] String),
    /// A network operation did not complete within its deadline.
    #[display("timed out after {}ms", _0.as_millis())]
    Timeout(#[error(not(source))] Duration),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Path contains invalid characters or escapes the share root
    #[display("invalid path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// Endpoint configuration is unusable (e.g. missing host). Raised before
    /// any I/O is attempted.
    #[display("invalid configuration: {_0}")]
    Config(#[error(not(source))] String),
    /// Share or directory listing failed.
    #[display("enumeration failed: {_0}")]
    Enumeration(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_) | Self::Enumeration(_))
    }

    /// Credentials were rejected, but the server spoke the protocol.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// The server could not be reached with the attempted settings.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Transport("connection refused".into()).to_string(), "transport error: connection refused");
        assert_eq!(ErrorKind::Timeout(Duration::from_secs(5)).to_string(), "timed out after 5000ms");
        assert_eq!(ErrorKind::Auth("nas".into()).to_string(), "authentication rejected for nas");
    }

    #[test]
    fn error_kind_classification() {
        assert!(ErrorKind::Auth("h".into()).is_auth());
        assert!(!ErrorKind::Auth("h".into()).is_unreachable());
        assert!(ErrorKind::Transport("h".into()).is_unreachable());
        assert!(ErrorKind::Timeout(Duration::ZERO).is_unreachable());
        assert!(ErrorKind::Timeout(Duration::ZERO).is_retryable());
        assert!(!ErrorKind::Config("no host".into()).is_retryable());
    }
}
