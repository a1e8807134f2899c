//! Server endpoints and credentials.

use crate::error::{ErrorKind, Result};
use std::fmt;

/// Username used when none is configured.
pub const GUEST_USERNAME: &str = "guest";

/// Credentials presented to an SMB server.
///
/// Defaults to guest access: username `guest`, empty password, no domain.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub domain: String,
    pub username: String,
    pub password: String,
}
impl Default for Credentials {
    fn default() -> Self {
        Self::guest()
    }
}
impl Credentials {
    pub fn guest() -> Self {
        Self {
            domain: String::new(),
            username: GUEST_USERNAME.to_string(),
            password: String::new(),
        }
    }

    /// Build credentials from optional, user-entered values.
    ///
    /// Domain and username are trimmed; a missing or blank username falls
    /// back to `guest`. Passwords are taken verbatim.
    ///
    /// # Examples
    ///
    /// ```
    /// use lanfeed_smb::Credentials;
    ///
    /// let creds = Credentials::new(None, Some("  "), None);
    /// assert!(creds.is_guest());
    /// let creds = Credentials::new(Some(" HOME "), Some("alice"), Some(" s3cret"));
    /// assert_eq!(creds.domain, "HOME");
    /// assert_eq!(creds.password, " s3cret");
    /// ```
    pub fn new(domain: Option<&str>, username: Option<&str>, password: Option<&str>) -> Self {
        let username = username.map(str::trim).filter(|u| !u.is_empty()).unwrap_or(GUEST_USERNAME);
        Self {
            domain: domain.map(str::trim).unwrap_or_default().to_string(),
            username: username.to_string(),
            password: password.unwrap_or_default().to_string(),
        }
    }

    pub fn is_guest(&self) -> bool {
        self.username.eq_ignore_ascii_case(GUEST_USERNAME) && self.password.is_empty()
    }
}
impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_guest(), self.domain.is_empty()) {
            (true, _) => f.write_str("Guest credentials"),
            (false, true) => write!(f, "User: {}", self.username),
            (false, false) => write!(f, "User: {}\\{}", self.domain, self.username),
        }
    }
}
// Never print passwords, not even in debug logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

/// An SMB server and the credentials used to talk to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    host: String,
    credentials: Credentials,
}
impl ServerEndpoint {
    /// Create an endpoint for `host` using guest credentials.
    ///
    /// Accepts bare hosts as well as `smb://host/...` style input; anything
    /// after the host is ignored. Returns [`Config`](ErrorKind::Config) if no
    /// host remains; this is checked before any I/O happens.
    pub fn new(host: impl AsRef<str>) -> Result<Self> {
        let raw = host.as_ref().trim();
        let host = raw.strip_prefix("smb://").unwrap_or(raw).trim_start_matches(['/', '\\']);
        let host = host.split(['/', '\\']).next().unwrap_or_default();
        if host.is_empty() {
            exn::bail!(ErrorKind::Config(format!("missing host in `{raw}`")));
        }
        Ok(Self { host: host.to_string(), credentials: Credentials::guest() })
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Identity used for per-host caches: the host, lower-cased.
    pub fn cache_key(&self) -> String {
        self.host.to_lowercase()
    }
}
impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "smb://{} ({})", self.host, self.credentials)
    }
}
