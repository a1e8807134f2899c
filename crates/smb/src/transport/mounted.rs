//! SMB transport backed by the operating system's SMB client.
//!
//! Shares are expected to be mounted (or, on Windows, reachable as UNC paths)
//! under a common root, laid out as `<root>/<host>/<share>/...`. The OS takes
//! care of dialect negotiation and authentication at mount time; this
//! transport only maps filesystem errors onto the SMB error categories and
//! enforces the configured deadlines.

use super::{BoxAsyncRead, IdleTimeoutReader, RawEntry, SessionHandle, SmbSession, SmbTransport, Timeouts, timed};
use crate::endpoint::ServerEndpoint;
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;
use tracing::instrument;

/// Transport reading shares from a directory of mounted servers.
///
/// # Examples
///
/// ```no_run
/// use lanfeed_smb::transport::MountedTransport;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// // Expects e.g. /mnt/smb/nas/media/Photos/...
/// let transport = MountedTransport::new("mounts", "/mnt/smb")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MountedTransport {
    name: String,
    root: PathBuf,
}
impl MountedTransport {
    /// Create a transport rooted at `root`, which must be an absolute path.
    ///
    /// The root is not required to exist yet: mounts may appear later, and a
    /// missing host directory is reported as an unreachable server at connect
    /// time.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::Config(format!("mount root `{}` is not absolute", root.display())));
        }
        Ok(Self { name: name.into(), root })
    }

    /// Transport addressing servers directly through UNC paths
    /// (`\\host\share\...`).
    #[cfg(windows)]
    pub fn unc(name: impl Into<String>) -> Self {
        Self { name: name.into(), root: PathBuf::from(r"\\") }
    }

    fn host_root(&self, endpoint: &ServerEndpoint) -> Result<PathBuf> {
        let host = validate_path(endpoint.host())?;
        if host.is_empty() || host.contains('/') {
            exn::bail!(ErrorKind::Config(format!("unusable host `{}`", endpoint.host())));
        }
        Ok(self.root.join(host))
    }
}

#[async_trait]
impl SmbTransport for MountedTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, profile), fields(transport = %self.name, dialect = %profile.dialect))]
    async fn connect(&self, endpoint: &ServerEndpoint, profile: &super::TransportProfile) -> Result<SessionHandle> {
        let host_root = self.host_root(endpoint)?;
        let metadata = timed(profile.timeouts.connect, async {
            fs::metadata(&host_root).await.map_err(|e| exn::Exn::from(map_io_error(e, &host_root)))
        })
        .await;
        match metadata {
            Ok(metadata) if metadata.is_dir() => {},
            Ok(_) => exn::bail!(ErrorKind::Transport(format!("`{}` is not a mounted server", host_root.display()))),
            Err(err) => match &*err {
                ErrorKind::PermissionDenied(_) => exn::bail!(ErrorKind::Auth(endpoint.host().to_string())),
                ErrorKind::Timeout(_) => return Err(err),
                _ => exn::bail!(ErrorKind::Transport(format!("{} is not mounted", endpoint.host()))),
            },
        }
        tracing::debug!(root = %host_root.display(), "using mounted server");
        Ok(Box::new(MountedSession {
            host_root,
            timeouts: profile.timeouts,
            closed: AtomicBool::new(false),
        }))
    }
}

struct MountedSession {
    host_root: PathBuf,
    timeouts: Timeouts,
    closed: AtomicBool,
}
impl MountedSession {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            exn::bail!(ErrorKind::Transport("session closed".to_string()));
        }
        Ok(())
    }

    fn resolve(&self, share: &str, path: &str) -> Result<PathBuf> {
        self.ensure_open()?;
        let share = validate_path(share)?;
        if share.is_empty() || share.contains('/') {
            exn::bail!(ErrorKind::InvalidPath(share));
        }
        let path = validate_path(path)?;
        Ok(self.host_root.join(share).join(path))
    }

    async fn read_entries(&self, dir: &Path) -> Result<Vec<RawEntry>> {
        let metadata = fs::metadata(dir).await.map_err(|e| map_io_error(e, dir))?;
        if !metadata.is_dir() {
            exn::bail!(ErrorKind::NotADirectory(dir.display().to_string()));
        }
        let mut entries = fs::read_dir(dir).await.map_err(|e| map_io_error(e, dir))?;
        let mut listing = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| map_io_error(e, dir))? {
            let size = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata.len(),
                // Directories and broken links.
                _ => 0,
            };
            listing.push(RawEntry::new(entry.file_name().to_string_lossy(), size));
        }
        Ok(listing)
    }
}

#[async_trait]
impl SmbSession for MountedSession {
    async fn list_shares(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let host_root = self.host_root.clone();
        timed(self.timeouts.response, async {
            let entries = self.read_entries(&host_root).await.map_err(|err| {
                let message = err.to_string();
                err.raise(ErrorKind::Enumeration(message))
            })?;
            Ok(entries.into_iter().map(|entry| entry.name).collect())
        })
        .await
    }

    async fn open_share(&self, share: &str) -> Result<()> {
        let dir = self.resolve(share, "")?;
        timed(self.timeouts.response, async {
            let metadata = fs::metadata(&dir).await.map_err(|e| map_io_error(e, &dir))?;
            if !metadata.is_dir() {
                exn::bail!(ErrorKind::NotFound(share.to_string()));
            }
            // Permissions only surface once the directory is actually read.
            fs::read_dir(&dir).await.map_err(|e| map_io_error(e, &dir))?;
            Ok(())
        })
        .await
    }

    async fn list(&self, share: &str, path: &str) -> Result<Vec<RawEntry>> {
        let dir = self.resolve(share, path)?;
        timed(self.timeouts.response, self.read_entries(&dir)).await
    }

    async fn reader(&self, share: &str, path: &str) -> Result<BoxAsyncRead> {
        let file = self.resolve(share, path)?;
        let idle = self.timeouts.idle;
        timed(self.timeouts.response, async {
            let metadata = fs::metadata(&file).await.map_err(|e| map_io_error(e, &file))?;
            if metadata.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(format!("{} is a directory", file.display())));
            }
            let handle = fs::File::open(&file).await.map_err(|e| map_io_error(e, &file))?;
            let reader: BoxAsyncRead = Box::pin(IdleTimeoutReader::new(handle, idle));
            Ok(reader)
        })
        .await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
    match e.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.display().to_string()),
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.display().to_string()),
        std::io::ErrorKind::NotADirectory => ErrorKind::NotADirectory(path.display().to_string()),
        _ => ErrorKind::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Dialect, TransportProfile};
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn mounted() -> (TempDir, MountedTransport) {
        let dir = TempDir::new().unwrap();
        let share = dir.path().join("nas").join("media");
        std::fs::create_dir_all(share.join("Photos")).unwrap();
        std::fs::write(share.join("Photos").join("beach.jpg"), b"jpeg bytes").unwrap();
        std::fs::write(share.join("notes.txt"), b"hello").unwrap();
        std::fs::create_dir_all(dir.path().join("nas").join("backup")).unwrap();
        let transport = MountedTransport::new("test", dir.path()).unwrap();
        (dir, transport)
    }

    fn profile() -> TransportProfile {
        TransportProfile::new(Dialect::Smb2Plus, Timeouts::default())
    }

    #[test]
    fn test_relative_root_rejected() {
        let err = MountedTransport::new("test", "relative/root").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Config(_)));
    }

    #[tokio::test]
    async fn test_unmounted_host_is_unreachable() {
        let (_dir, transport) = mounted();
        let endpoint = ServerEndpoint::new("other").unwrap();
        let err = transport.connect(&endpoint, &profile()).await.err().unwrap();
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn test_list_shares_and_entries() {
        let (_dir, transport) = mounted();
        let session = transport.connect(&ServerEndpoint::new("nas").unwrap(), &profile()).await.unwrap();

        let mut shares = session.list_shares().await.unwrap();
        shares.sort();
        assert_eq!(shares, vec!["backup", "media"]);

        let mut entries = session.list("media", "").await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(entries, vec![RawEntry::new("Photos", 0), RawEntry::new("notes.txt", 5)]);
        session.close().await;
    }

    #[tokio::test]
    async fn test_list_file_is_not_a_directory() {
        let (_dir, transport) = mounted();
        let session = transport.connect(&ServerEndpoint::new("nas").unwrap(), &profile()).await.unwrap();
        let err = session.list("media", "notes.txt").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotADirectory(_)));
        let err = session.list("media", "missing").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reader_streams_file() {
        let (_dir, transport) = mounted();
        let session = transport.connect(&ServerEndpoint::new("nas").unwrap(), &profile()).await.unwrap();
        let mut reader = session.reader("media", "Photos/beach.jpg").await.unwrap();
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await.unwrap();
        assert_eq!(data, b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_share_escape_rejected() {
        let (_dir, transport) = mounted();
        let session = transport.connect(&ServerEndpoint::new("nas").unwrap(), &profile()).await.unwrap();
        assert!(session.list("media", "../backup").await.is_err());
        assert!(session.open_share("media/Photos").await.is_err());
        assert!(session.open_share("missing").await.is_err());
        session.open_share("media").await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_session_rejects_operations() {
        let (_dir, transport) = mounted();
        let session = transport.connect(&ServerEndpoint::new("nas").unwrap(), &profile()).await.unwrap();
        session.close().await;
        session.close().await;
        let err = session.list("media", "").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Transport(_)));
    }
}
