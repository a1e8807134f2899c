//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Errors from the share and cache
//! crates are kept as children in the tree.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Rejected before any I/O was attempted (missing host or share, ...).
    #[display("invalid configuration: {_0}")]
    Config(#[error(not(source))] String),
    #[display("invalid cache marker: {_0}")]
    InvalidMarker(#[error(not(source))] String),
    /// Talking to the SMB server failed.
    #[display("network share error")]
    Share,
    /// Reading or writing the local cache failed.
    #[display("cache error")]
    Cache,
    /// The browse session ended while the operation was running.
    #[display("operation cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Share | Self::Cache)
    }
}
