//! SMB transport trait and implementations.
//!
//! This module defines the [`SmbTransport`] and [`SmbSession`] traits: the
//! seam between the discovery/caching logic in this workspace and whatever
//! actually speaks SMB on the wire (the operating system's client via mounted
//! shares, or an in-memory mock in tests).

mod idle;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod mounted;

pub use self::idle::IdleTimeoutReader;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockServer, MockTransport};
pub use self::mounted::MountedTransport;
use crate::endpoint::ServerEndpoint;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;

pub type BoxAsyncRead = Pin<Box<dyn AsyncRead + Send + 'static>>;
pub type SessionHandle = Box<dyn SmbSession>;
pub type TransportHandle = Arc<dyn SmbTransport>;

/// SMB wire-protocol generation a connection is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// SMB 2.0.2 through 3.1.1 only.
    Smb2Plus,
    /// Legacy SMB1/CIFS only.
    Smb1Only,
    /// Let the server pick; the compatibility profile used when nothing is
    /// known about the server yet.
    Negotiate,
}
impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Smb2Plus => "SMB2+",
            Dialect::Smb1Only => "SMB1",
            Dialect::Negotiate => "negotiate",
        })
    }
}

/// Deadlines applied to every network operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Establishing the connection and authenticating.
    pub connect: Duration,
    /// Waiting for a response to a single request.
    pub response: Duration,
    /// Maximum silence on an open stream before it is abandoned.
    pub idle: Duration,
}
impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            response: Duration::from_secs(15),
            idle: Duration::from_secs(20),
        }
    }
}

/// Transport settings for a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportProfile {
    pub dialect: Dialect,
    pub timeouts: Timeouts,
}
impl TransportProfile {
    pub fn new(dialect: Dialect, timeouts: Timeouts) -> Self {
        Self { dialect, timeouts }
    }
}

/// A directory entry as reported by the server, before any classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub name: String,
    /// End-of-file size in bytes (servers usually report `0` for directories).
    pub size: u64,
}
impl RawEntry {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self { name: name.into(), size }
    }

    /// `.` and `..`, which some servers include in every listing.
    pub fn is_dot(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// Something that can open sessions to SMB servers.
#[async_trait]
pub trait SmbTransport: Send + Sync {
    /// Name of the transport (used for logging only).
    fn name(&self) -> &str;

    /// Connect to and authenticate with `endpoint`, restricted to the
    /// profile's dialect.
    ///
    /// Must fail with [`Auth`](ErrorKind::Auth) when the handshake succeeded
    /// but the credentials were rejected, and with
    /// [`Transport`](ErrorKind::Transport) or [`Timeout`](ErrorKind::Timeout)
    /// when the server could not be reached with these settings.
    async fn connect(&self, endpoint: &ServerEndpoint, profile: &TransportProfile) -> Result<SessionHandle>;
}

/// An authenticated connection to one server.
///
/// A session is owned by exactly one operation at a time. Call
/// [`close()`](Self::close) on every exit path; implementations must also
/// release their resources when dropped, so abandoned (cancelled) operations
/// do not leak sockets.
#[async_trait]
pub trait SmbSession: Send + Sync {
    /// List the server root: the names of all shares, administrative ones
    /// included.
    async fn list_shares(&self) -> Result<Vec<String>>;

    /// Check that a share exists and can be connected to.
    async fn open_share(&self, share: &str) -> Result<()>;

    /// List a directory inside a share. The listing may contain `.`/`..`.
    ///
    /// Listing something that is not a directory fails.
    async fn list(&self, share: &str, path: &str) -> Result<Vec<RawEntry>>;

    /// Open a file for streaming reads.
    ///
    /// The reader is `'static`: it stays usable until dropped and does not
    /// borrow the session.
    async fn reader(&self, share: &str, path: &str) -> Result<BoxAsyncRead>;

    /// Release the session. Idempotent.
    async fn close(&self);
}

/// Bound a network operation by `limit`, mapping expiry to
/// [`Timeout`](ErrorKind::Timeout).
pub async fn timed<T>(limit: Duration, operation: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_elapsed) => exn::bail!(ErrorKind::Timeout(limit)),
    }
}
