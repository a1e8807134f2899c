//! Media Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A media error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The named media kind is not one we know about.
    #[display("unknown media kind: {_0}")]
    UnknownKind(#[error(not(source))] String),
    /// A source path was missing its host or share component.
    #[display("incomplete source path: {_0}")]
    IncompleteSource(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::UnknownKind("Hologram".to_string()).to_string(), "unknown media kind: Hologram");
        assert_eq!(ErrorKind::IncompleteSource("smb://".to_string()).to_string(), "incomplete source path: smb://");
    }
}
