//! Share enumeration.

use crate::detect::ProtocolDetector;
use crate::endpoint::ServerEndpoint;
use crate::error::ErrorKind;
use crate::transport::{SmbSession, Timeouts, TransportHandle};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::instrument;

/// Share names tried one by one when the server will not list its shares.
pub const WELL_KNOWN_SHARES: [&str; 11] = [
    "media",
    "share",
    "shared",
    "public",
    "home",
    "users",
    "documents",
    "downloads",
    "pictures",
    "videos",
    "music",
];

/// Stop probing well-known names after this many hits.
pub const MAX_PROBED_SHARES: usize = 5;

/// Placeholder shown when nothing could be found.
pub const NO_SHARES_FOUND: &str = "No accessible shares found";
/// Placeholder inviting the user to type a share name.
pub const ENTER_SHARE_MANUALLY: &str = "Try entering share name manually";

const ADMINISTRATIVE_SHARES: [&str; 5] = ["IPC", "ADMIN", "print$", "NETLOGON", "SYSVOL"];

/// A share offered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareDescriptor {
    pub name: String,
    /// `false` for placeholders, whose name is explanatory text rather than a
    /// share.
    pub is_accessible: bool,
}
impl ShareDescriptor {
    pub fn accessible(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_accessible: true }
    }

    pub fn placeholder(text: impl Into<String>) -> Self {
        Self { name: text.into(), is_accessible: false }
    }
}

/// Hidden (`$`-suffixed) and system shares that never hold user media.
///
/// ```
/// use lanfeed_smb::shares::is_administrative_share;
///
/// assert!(is_administrative_share("C$"));
/// assert!(is_administrative_share("netlogon"));
/// assert!(!is_administrative_share("media"));
/// ```
pub fn is_administrative_share(name: &str) -> bool {
    name.ends_with('$') || ADMINISTRATIVE_SHARES.iter().any(|admin| admin.eq_ignore_ascii_case(name))
}

fn placeholders(reason: impl Into<String>) -> Vec<ShareDescriptor> {
    vec![ShareDescriptor::placeholder(reason), ShareDescriptor::placeholder(ENTER_SHARE_MANUALLY)]
}

/// Lists the shares a server offers, degrading to well-known guesses and
/// finally to placeholders. Never fails.
pub struct ShareEnumerator {
    transport: TransportHandle,
    detector: Arc<ProtocolDetector>,
    timeouts: Timeouts,
}
impl ShareEnumerator {
    pub fn new(transport: TransportHandle, detector: Arc<ProtocolDetector>, timeouts: Timeouts) -> Self {
        Self { transport, detector, timeouts }
    }

    #[instrument(skip(self), fields(host = %endpoint.host()))]
    pub async fn list_shares(&self, endpoint: &ServerEndpoint) -> Vec<ShareDescriptor> {
        let capability = self.detector.detect(endpoint).await;
        let profile = capability.profile(self.timeouts);
        let session = match self.transport.connect(endpoint, &profile).await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "could not connect to list shares");
                let reason = match &*err {
                    ErrorKind::Auth(_) => "Check credentials".to_string(),
                    _ => format!("Server unreachable: {}", endpoint.host()),
                };
                return placeholders(reason);
            },
        };
        let shares = Self::enumerate(session.as_ref()).await;
        session.close().await;

        if shares.is_empty() {
            tracing::info!("no shares found");
            return placeholders(NO_SHARES_FOUND);
        }
        tracing::info!(count = shares.len(), "listed shares");
        shares.into_iter().map(ShareDescriptor::accessible).collect()
    }

    async fn enumerate(session: &dyn SmbSession) -> Vec<String> {
        match session.list_shares().await {
            Ok(names) => {
                let listed = Self::filter(names);
                if !listed.is_empty() {
                    return listed;
                }
                tracing::debug!("server root listed no user shares");
            },
            Err(err) => tracing::debug!(error = %err, "server root listing failed"),
        }
        Self::probe_well_known(session).await
    }

    /// Drop administrative shares, strip trailing separators, dedupe and sort.
    fn filter(names: Vec<String>) -> Vec<String> {
        let unique: BTreeSet<String> = names
            .into_iter()
            .map(|name| name.trim_end_matches('/').to_string())
            .filter(|name| !name.is_empty() && !is_administrative_share(name))
            .collect();
        unique.into_iter().collect()
    }

    async fn probe_well_known(session: &dyn SmbSession) -> Vec<String> {
        let mut found = Vec::new();
        for name in WELL_KNOWN_SHARES {
            if found.len() >= MAX_PROBED_SHARES {
                break;
            }
            match session.open_share(name).await {
                Ok(()) => found.push(name.to_string()),
                Err(err) => tracing::trace!(share = name, error = %err, "well-known share not available"),
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Credentials;
    use crate::transport::{Dialect, MockServer, MockTransport};
    use rstest::rstest;

    fn enumerator(transport: &MockTransport) -> ShareEnumerator {
        let handle: TransportHandle = Arc::new(transport.clone());
        let detector = Arc::new(ProtocolDetector::new(Arc::clone(&handle), Timeouts::default()));
        ShareEnumerator::new(handle, detector, Timeouts::default())
    }

    fn names(shares: &[ShareDescriptor]) -> Vec<&str> {
        shares.iter().map(|s| s.name.as_str()).collect()
    }

    #[rstest]
    #[case("C$", true)]
    #[case("IPC$", true)]
    #[case("ipc", true)]
    #[case("Admin", true)]
    #[case("PRINT$", true)]
    #[case("sysvol", true)]
    #[case("NETLOGON", true)]
    #[case("media", false)]
    #[case("administration", false)]
    fn test_administrative_shares(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_administrative_share(name), expected);
    }

    #[tokio::test]
    async fn test_lists_sorted_user_shares() {
        let server = MockServer::new().with_share("video").with_share("Music").with_share("backup$");
        let transport = MockTransport::new().with_server("nas", server);
        let shares = enumerator(&transport).list_shares(&ServerEndpoint::new("nas").unwrap()).await;
        assert_eq!(names(&shares), vec!["Music", "video"]);
        assert!(shares.iter().all(|s| s.is_accessible));
        assert_eq!(transport.open_sessions(), 0);
    }

    #[test]
    fn test_filter_dedupes_and_strips() {
        let names = vec!["media/".to_string(), "media".to_string(), "C$".to_string(), "/".to_string()];
        assert_eq!(ShareEnumerator::filter(names), vec!["media"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_well_known_names() {
        let server = MockServer::new()
            .without_share_listing()
            .with_share("public")
            .with_share("media")
            .with_share("obscure")
            .with_inaccessible_share("home");
        let transport = MockTransport::new().with_server("nas", server);
        let shares = enumerator(&transport).list_shares(&ServerEndpoint::new("nas").unwrap()).await;
        assert_eq!(names(&shares), vec!["media", "public"]);
    }

    #[tokio::test]
    async fn test_well_known_probe_stops_at_limit() {
        let server = WELL_KNOWN_SHARES.iter().fold(MockServer::new().without_share_listing(), |s, n| s.with_share(n));
        let transport = MockTransport::new().with_server("nas", server);
        let shares = enumerator(&transport).list_shares(&ServerEndpoint::new("nas").unwrap()).await;
        assert_eq!(names(&shares), WELL_KNOWN_SHARES[..MAX_PROBED_SHARES].to_vec());
    }

    #[tokio::test]
    async fn test_only_admin_shares_probes_then_placeholders() {
        // Lists nothing but IPC$/ADMIN$ and has none of the well-known names.
        let transport = MockTransport::new().with_server("nas", MockServer::new().with_share("C$"));
        let shares = enumerator(&transport).list_shares(&ServerEndpoint::new("nas").unwrap()).await;
        assert_eq!(names(&shares), vec![NO_SHARES_FOUND, ENTER_SHARE_MANUALLY]);
        assert!(shares.iter().all(|s| !s.is_accessible));
    }

    #[tokio::test]
    async fn test_unreachable_host_placeholders() {
        let transport = MockTransport::new();
        let shares = enumerator(&transport).list_shares(&ServerEndpoint::new("ghost").unwrap()).await;
        assert_eq!(names(&shares), vec!["Server unreachable: ghost", ENTER_SHARE_MANUALLY]);
    }

    #[tokio::test]
    async fn test_rejected_credentials_placeholders() {
        let server = MockServer::new().requiring(Credentials::new(None, Some("alice"), Some("pw"))).with_share("media");
        let transport = MockTransport::new().with_server("nas", server);
        let shares = enumerator(&transport).list_shares(&ServerEndpoint::new("nas").unwrap()).await;
        assert_eq!(names(&shares), vec!["Check credentials", ENTER_SHARE_MANUALLY]);
    }

    #[tokio::test]
    async fn test_smb1_server_uses_detected_profile() {
        let server = MockServer::new().with_dialects([Dialect::Smb1Only]).with_share("media");
        let transport = MockTransport::new().with_server("old", server);
        let shares = enumerator(&transport).list_shares(&ServerEndpoint::new("old").unwrap()).await;
        assert_eq!(names(&shares), vec!["media"]);
        let last = transport.connect_attempts().pop().unwrap();
        assert_eq!(last.1, Dialect::Smb1Only);
    }
}
