//! Configuration Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// An explicitly requested configuration file does not exist.
    #[display("configuration file not found: {_0}")]
    MissingFile(#[error(not(source))] String),
    /// The layers could not be merged or deserialized.
    #[display("could not load configuration")]
    Load,
    /// Loaded fine, but a value makes no sense.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    #[display("no source with id `{_0}` configured")]
    UnknownSource(#[error(not(source))] String),
    /// No cache directory was configured and the platform offers none.
    #[display("could not determine a cache directory")]
    NoCacheDir,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Configuration does not fix itself; the user has to edit it.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
