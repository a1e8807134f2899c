//! In-memory SMB transport for testing.

use super::{
    BoxAsyncRead, Dialect, IdleTimeoutReader, RawEntry, SessionHandle, SmbSession, SmbTransport, Timeouts,
    TransportProfile, timed,
};
use crate::endpoint::{Credentials, ServerEndpoint};
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Administrative shares every mocked server reports next to its real ones.
const ADMIN_SHARES: [&str; 2] = ["IPC$", "ADMIN$"];

/// Description of one fake SMB server.
///
/// # Examples
///
/// ```
/// use lanfeed_smb::transport::{Dialect, MockServer};
///
/// let server = MockServer::new()
///     .with_dialects([Dialect::Smb1Only])
///     .with_file("media", "Photos/beach.jpg", b"jpeg")
///     .with_dir("media", "Empty");
/// ```
#[derive(Debug, Clone)]
pub struct MockServer {
    dialects: Vec<Dialect>,
    credentials: Option<Credentials>,
    share_listing: bool,
    shares: BTreeMap<String, Share>,
    connect_delay: Duration,
}
#[derive(Debug, Clone, Default)]
struct Share {
    accessible: bool,
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    denied: BTreeSet<String>,
}
impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}
impl MockServer {
    /// An SMB2+ server with no shares that accepts any credentials.
    pub fn new() -> Self {
        Self {
            dialects: vec![Dialect::Smb2Plus],
            credentials: None,
            share_listing: true,
            shares: BTreeMap::new(),
            connect_delay: Duration::ZERO,
        }
    }

    /// Restrict the dialects the server negotiates. An empty set makes every
    /// connection attempt fail at the transport level.
    pub fn with_dialects(mut self, dialects: impl IntoIterator<Item = Dialect>) -> Self {
        self.dialects = dialects.into_iter().collect();
        self
    }

    /// Reject every connection not presenting exactly these credentials.
    pub fn requiring(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Make listing the server root fail (shares can still be opened by name).
    pub fn without_share_listing(mut self) -> Self {
        self.share_listing = false;
        self
    }

    /// Delay every connection attempt.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Add an (empty) share.
    pub fn with_share(mut self, share: &str) -> Self {
        self.share(share);
        self
    }

    /// Add a share that is listed but cannot be opened.
    pub fn with_inaccessible_share(mut self, share: &str) -> Self {
        self.share(share).accessible = false;
        self
    }

    /// Add a file; parent directories are implied.
    ///
    /// Panics if the path fails validation. If test setup is wrong, then test
    /// should not pass.
    pub fn with_file(mut self, share: &str, path: &str, data: impl Into<Vec<u8>>) -> Self {
        let path = Self::checked(path);
        self.share(share).files.insert(path, data.into());
        self
    }

    /// Add an explicit (possibly empty) directory.
    pub fn with_dir(mut self, share: &str, path: &str) -> Self {
        let path = Self::checked(path);
        self.share(share).dirs.insert(path);
        self
    }

    /// Deny access to a path: listing or reading it fails with
    /// [`PermissionDenied`](ErrorKind::PermissionDenied).
    pub fn with_denied(mut self, share: &str, path: &str) -> Self {
        let path = Self::checked(path);
        self.share(share).denied.insert(path);
        self
    }

    fn share(&mut self, name: &str) -> &mut Share {
        self.shares.entry(name.to_string()).or_insert_with(|| Share { accessible: true, ..Share::default() })
    }

    fn checked(path: &str) -> String {
        match validate_path(path) {
            Ok(validated) if !validated.is_empty() => validated,
            // The panic here is DELIBERATE. MockServer is intended to be used
            // in tests; panics are expected.
            _ => panic!("MockServer: invalid path {path}"),
        }
    }

    fn accepts(&self, dialect: Dialect) -> bool {
        match dialect {
            Dialect::Negotiate => !self.dialects.is_empty(),
            specific => self.dialects.contains(&specific),
        }
    }
}
impl Share {
    fn is_dir(&self, path: &str) -> bool {
        if path.is_empty() || self.dirs.contains(path) {
            return true;
        }
        let prefix = format!("{path}/");
        self.files.keys().chain(self.dirs.iter()).any(|p| p.starts_with(&prefix))
    }

    fn children(&self, path: &str) -> BTreeMap<String, u64> {
        let prefix = match path.is_empty() {
            true => String::new(),
            false => format!("{path}/"),
        };
        let mut children = BTreeMap::new();
        let sized = self.files.iter().map(|(p, data)| (p, Some(data.len() as u64)));
        let unsized_dirs = self.dirs.iter().map(|p| (p, None));
        for (full, size) in sized.chain(unsized_dirs) {
            let Some(rest) = full.strip_prefix(&prefix) else { continue };
            match rest.split_once('/') {
                Some((dir, _)) => children.insert(dir.to_string(), 0),
                None => children.insert(rest.to_string(), size.unwrap_or_default()),
            };
        }
        children
    }

    fn is_denied(&self, path: &str) -> bool {
        self.denied.iter().any(|denied| path == denied || path.starts_with(&format!("{denied}/")))
    }
}

#[derive(Default)]
struct MockState {
    servers: RwLock<HashMap<String, Arc<MockServer>>>,
    connects: Mutex<Vec<(String, Dialect)>>,
    open_sessions: AtomicUsize,
    reads: AtomicUsize,
}

/// In-memory SMB transport for testing.
///
/// Clones share the same servers and counters, so a test can hand one clone
/// to the code under test and keep another to make assertions.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server under `host` (case-insensitive).
    pub fn with_server(self, host: &str, server: MockServer) -> Self {
        self.add_server(host, server);
        self
    }

    /// Register or replace a server while the transport is in use.
    pub fn add_server(&self, host: &str, server: MockServer) {
        let mut servers = self.state.servers.write().unwrap_or_else(PoisonError::into_inner);
        servers.insert(host.to_lowercase(), Arc::new(server));
    }

    /// Every connection attempt so far, in order.
    pub fn connect_attempts(&self) -> Vec<(String, Dialect)> {
        self.state.connects.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of connection attempts to `host`.
    pub fn connect_count(&self, host: &str) -> usize {
        self.connect_attempts().iter().filter(|(h, _)| h.eq_ignore_ascii_case(host)).count()
    }

    /// Sessions opened and not yet closed or dropped.
    pub fn open_sessions(&self) -> usize {
        self.state.open_sessions.load(Ordering::SeqCst)
    }

    /// Number of file readers handed out.
    pub fn files_read(&self) -> usize {
        self.state.reads.load(Ordering::SeqCst)
    }

    fn server(&self, host: &str) -> Option<Arc<MockServer>> {
        let servers = self.state.servers.read().unwrap_or_else(PoisonError::into_inner);
        servers.get(&host.to_lowercase()).cloned()
    }
}

#[async_trait]
impl SmbTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self, endpoint: &ServerEndpoint, profile: &TransportProfile) -> Result<SessionHandle> {
        {
            let mut connects = self.state.connects.lock().unwrap_or_else(PoisonError::into_inner);
            connects.push((endpoint.host().to_string(), profile.dialect));
        }
        let Some(server) = self.server(endpoint.host()) else {
            exn::bail!(ErrorKind::Transport(format!("no route to {}", endpoint.host())));
        };
        let delay = server.connect_delay;
        timed(profile.timeouts.connect, async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await?;
        if !server.accepts(profile.dialect) {
            exn::bail!(ErrorKind::Transport(format!("{} refused dialect {}", endpoint.host(), profile.dialect)));
        }
        if let Some(required) = &server.credentials
            && required != endpoint.credentials()
        {
            exn::bail!(ErrorKind::Auth(endpoint.host().to_string()));
        }
        self.state.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            server,
            state: Arc::clone(&self.state),
            timeouts: profile.timeouts,
            closed: AtomicBool::new(false),
        }))
    }
}

struct MockSession {
    server: Arc<MockServer>,
    state: Arc<MockState>,
    timeouts: Timeouts,
    closed: AtomicBool,
}
impl MockSession {
    fn release(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn share(&self, name: &str) -> Result<&Share> {
        if self.closed.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Transport("session closed".to_string()));
        }
        let share = self.server.shares.get(name).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(name.to_string())))?;
        if !share.accessible {
            exn::bail!(ErrorKind::PermissionDenied(name.to_string()));
        }
        Ok(share)
    }
}
impl Drop for MockSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl SmbSession for MockSession {
    async fn list_shares(&self) -> Result<Vec<String>> {
        if !self.server.share_listing {
            exn::bail!(ErrorKind::Enumeration("server root listing is disabled".to_string()));
        }
        let shares = self.server.shares.keys().cloned();
        Ok(shares.chain(ADMIN_SHARES.iter().map(|s| s.to_string())).collect())
    }

    async fn open_share(&self, share: &str) -> Result<()> {
        self.share(share).map(|_| ())
    }

    async fn list(&self, share: &str, path: &str) -> Result<Vec<RawEntry>> {
        let contents = self.share(share)?;
        let path = validate_path(path)?;
        if contents.is_denied(&path) {
            exn::bail!(ErrorKind::PermissionDenied(format!("{share}/{path}")));
        }
        if contents.files.contains_key(&path) {
            exn::bail!(ErrorKind::NotADirectory(format!("{share}/{path}")));
        }
        if !contents.is_dir(&path) {
            exn::bail!(ErrorKind::NotFound(format!("{share}/{path}")));
        }
        let dots = [RawEntry::new(".", 0), RawEntry::new("..", 0)];
        let children = contents.children(&path).into_iter().map(|(name, size)| RawEntry::new(name, size));
        Ok(dots.into_iter().chain(children).collect())
    }

    async fn reader(&self, share: &str, path: &str) -> Result<BoxAsyncRead> {
        let contents = self.share(share)?;
        let path = validate_path(path)?;
        if contents.is_denied(&path) {
            exn::bail!(ErrorKind::PermissionDenied(format!("{share}/{path}")));
        }
        let data = contents.files.get(&path).cloned();
        let data = data.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(format!("{share}/{path}"))))?;
        self.state.reads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(IdleTimeoutReader::new(Cursor::new(data), self.timeouts.idle)))
    }

    async fn close(&self) {
        self.release();
    }
}
