//! On-demand caching of share files.

use crate::error::{ErrorKind, Result};
use crate::marker::CacheMarker;
use crate::policy::CachePolicy;
use exn::ResultExt;
use futures::stream::{self, StreamExt};
use lanfeed_cache::CacheStore;
use lanfeed_media::{MediaFileDescriptor, MediaKind, MediaOrigin, SourcePath};
use lanfeed_smb::{ProtocolDetector, ServerEndpoint, Timeouts, TransportHandle};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::instrument;

/// Items of a listing resolved concurrently.
pub const RESOLVE_CONCURRENCY: usize = 4;
/// Positions, relative to the item on screen, whose images are warmed up.
pub const PREFETCH_OFFSETS: [isize; 5] = [1, 2, 3, -1, -2];

/// What the viewer should do to show an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayableReference {
    /// Ready on local storage.
    Local(PathBuf),
    /// Not cached yet; pass the marker to
    /// [`materialize()`](OnDemandCacheOrchestrator::materialize) when the
    /// item is opened.
    Deferred(CacheMarker),
    /// Nothing to show (not displayable, or caching failed).
    Placeholder,
    /// Fetch from this URL directly.
    Remote(String),
}

/// Applies the caching policy to listings and turns markers into local files.
///
/// Share files are fetched through the transport, using the endpoint (and
/// credentials) registered for their host, and stored in the [`CacheStore`].
/// No failure crosses this boundary: an item that cannot be cached resolves
/// to a [`Placeholder`](PlayableReference::Placeholder), and a marker that
/// cannot be materialized to `None`.
pub struct OnDemandCacheOrchestrator {
    transport: TransportHandle,
    detector: Arc<ProtocolDetector>,
    store: Arc<CacheStore>,
    timeouts: Timeouts,
    endpoints: RwLock<HashMap<String, ServerEndpoint>>,
}
impl OnDemandCacheOrchestrator {
    pub fn new(
        transport: TransportHandle,
        detector: Arc<ProtocolDetector>,
        store: Arc<CacheStore>,
        timeouts: Timeouts,
    ) -> Self {
        Self { transport, detector, store, timeouts, endpoints: RwLock::default() }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Remember how to reach (and authenticate with) the endpoint's host.
    pub fn register_endpoint(&self, endpoint: &ServerEndpoint) {
        let mut endpoints = self.endpoints.write().unwrap_or_else(PoisonError::into_inner);
        endpoints.insert(endpoint.cache_key(), endpoint.clone());
    }

    /// Endpoint registered for `host`, or guest access when there is none.
    fn endpoint_for(&self, host: &str) -> Result<ServerEndpoint> {
        let endpoints = self.endpoints.read().unwrap_or_else(PoisonError::into_inner);
        match endpoints.get(&host.to_lowercase()) {
            Some(endpoint) => Ok(endpoint.clone()),
            None => ServerEndpoint::new(host).or_raise(|| ErrorKind::Config(format!("unusable host `{host}`"))),
        }
    }

    /// Resolve one listing item according to its [`CachePolicy`].
    ///
    /// Eager items are cached before this returns.
    #[instrument(skip(self, descriptor), fields(item = %descriptor.source_identity))]
    pub async fn resolve(&self, descriptor: &MediaFileDescriptor) -> PlayableReference {
        let policy = CachePolicy::for_descriptor(descriptor);
        match (&descriptor.origin, policy) {
            (MediaOrigin::Direct(url), _) => PlayableReference::Remote(url.clone()),
            (MediaOrigin::Local(path), _) => PlayableReference::Local(path.clone()),
            (MediaOrigin::Share(_), CachePolicy::Placeholder) => PlayableReference::Placeholder,
            (MediaOrigin::Share(source), CachePolicy::Eager) => match self.fetch(source).await {
                Ok(path) => PlayableReference::Local(path),
                Err(err) => {
                    tracing::warn!(error = %err, "eager caching failed");
                    PlayableReference::Placeholder
                },
            },
            (MediaOrigin::Share(source), _) => PlayableReference::Deferred(CacheMarker::new(source.clone())),
        }
    }

    /// Resolve a whole listing, a few items at a time. The output is in the
    /// same order as the input.
    pub async fn resolve_all(&self, descriptors: &[MediaFileDescriptor]) -> Vec<PlayableReference> {
        stream::iter(descriptors)
            .map(|descriptor| self.resolve(descriptor))
            .buffered(RESOLVE_CONCURRENCY)
            .collect()
            .await
    }

    /// Local path for a deferred item, caching it first if needed.
    ///
    /// Returns `None` when the file cannot be made available for any reason;
    /// a later call retries from scratch.
    #[instrument(skip(self), fields(marker = %marker))]
    pub async fn materialize(&self, marker: &CacheMarker) -> Option<PathBuf> {
        match self.fetch(marker.source()).await {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::warn!(error = %err, "could not materialize");
                None
            },
        }
    }

    /// Parse and [`materialize()`](Self::materialize) a marker string.
    pub async fn materialize_str(&self, marker: &str) -> Option<PathBuf> {
        match marker.parse::<CacheMarker>() {
            Ok(marker) => self.materialize(&marker).await,
            Err(err) => {
                tracing::warn!(error = %err, "not a cache marker");
                None
            },
        }
    }

    /// Warm the cache for deferred images around the item at `index`, so
    /// swiping to a neighbour is instant. Returns how many were cached.
    pub async fn prefetch_around(&self, items: &[PlayableReference], index: usize) -> usize {
        let markers: Vec<&CacheMarker> = PREFETCH_OFFSETS
            .iter()
            .filter_map(|offset| index.checked_add_signed(*offset))
            .filter_map(|neighbour| match items.get(neighbour) {
                Some(PlayableReference::Deferred(marker)) => Some(marker),
                _ => None,
            })
            .filter(|marker| MediaKind::from_name(marker.source().file_name()) == MediaKind::Image)
            .collect();
        let cached = futures::future::join_all(markers.into_iter().map(|marker| self.materialize(marker))).await;
        cached.into_iter().flatten().count()
    }

    /// Cached copy of `source`, downloading it on a miss.
    async fn fetch(&self, source: &SourcePath) -> Result<PathBuf> {
        let key = CacheMarker::new(source.clone()).key();
        if let Some(path) = self.store.get(&key).await.or_raise(|| ErrorKind::Cache)? {
            tracing::debug!(%source, "cache hit");
            return Ok(path);
        }

        let endpoint = self.endpoint_for(&source.host)?;
        let profile = self.detector.detect(&endpoint).await.profile(self.timeouts);
        let session = self.transport.connect(&endpoint, &profile).await.or_raise(|| ErrorKind::Share)?;
        let stored = async {
            let reader = session.reader(&source.share, &source.path).await.or_raise(|| ErrorKind::Share)?;
            self.store.put(&key, reader).await.or_raise(|| ErrorKind::Cache)
        }
        .await;
        session.close().await;
        stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanfeed_cache::CacheSettings;
    use lanfeed_smb::Credentials;
    use lanfeed_smb::transport::{MockServer, MockTransport};
    use tempfile::TempDir;

    const MIB: usize = 1024 * 1024;

    struct Fixture {
        _dir: TempDir,
        transport: MockTransport,
        orchestrator: OnDemandCacheOrchestrator,
    }

    fn fixture(server: MockServer) -> Fixture {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new().with_server("nas", server);
        let handle: TransportHandle = Arc::new(transport.clone());
        let detector = Arc::new(ProtocolDetector::new(Arc::clone(&handle), Timeouts::default()));
        let settings = CacheSettings { min_free_bytes: 0, ..CacheSettings::default() };
        let store = Arc::new(CacheStore::new(dir.path(), settings).unwrap());
        let orchestrator = OnDemandCacheOrchestrator::new(handle, detector, store, Timeouts::default());
        Fixture { _dir: dir, transport, orchestrator }
    }

    fn server() -> MockServer {
        MockServer::new()
            .with_file("media", "small.png", vec![1; 2 * MIB])
            .with_file("media", "big.jpg", vec![2; 12 * MIB])
            .with_file("media", "movie.mp4", vec![3; 1024])
            .with_file("media", "song.mp3", vec![4; 16])
    }

    fn item(name: &str, size: usize) -> MediaFileDescriptor {
        MediaFileDescriptor::from_share("den", SourcePath::new("nas", "media", name), size as u64)
    }

    #[tokio::test]
    async fn test_small_image_is_cached_eagerly() {
        let f = fixture(server());
        let resolved = f.orchestrator.resolve(&item("small.png", 2 * MIB)).await;
        let PlayableReference::Local(path) = resolved else { panic!("expected a local file, got {resolved:?}") };
        assert_eq!(std::fs::metadata(&path).unwrap().len(), (2 * MIB) as u64);
        assert_eq!(f.transport.files_read(), 1);
        assert_eq!(f.transport.open_sessions(), 0);

        // Second listing is served from the cache.
        f.orchestrator.resolve(&item("small.png", 2 * MIB)).await;
        assert_eq!(f.transport.files_read(), 1);
    }

    #[tokio::test]
    async fn test_video_is_deferred_until_materialized() {
        let f = fixture(server());
        let resolved = f.orchestrator.resolve(&item("movie.mp4", 50 * MIB)).await;
        let PlayableReference::Deferred(marker) = resolved else { panic!("expected a marker, got {resolved:?}") };
        assert_eq!(marker.to_string(), "smb-cache://nas/media/movie.mp4");
        assert_eq!(f.transport.files_read(), 0);
        assert_eq!(f.transport.connect_attempts().len(), 0);

        let path = f.orchestrator.materialize(&marker).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![3; 1024]);
        assert_eq!(f.transport.files_read(), 1);
        assert_eq!(f.orchestrator.materialize(&marker).await, Some(path));
        assert_eq!(f.transport.files_read(), 1);
    }

    #[tokio::test]
    async fn test_large_image_is_deferred() {
        let f = fixture(server());
        let resolved = f.orchestrator.resolve(&item("big.jpg", 12 * MIB)).await;
        assert!(matches!(resolved, PlayableReference::Deferred(_)));
        assert_eq!(f.transport.files_read(), 0);
    }

    #[tokio::test]
    async fn test_non_displayable_and_foreign_items() {
        let f = fixture(server());
        assert_eq!(f.orchestrator.resolve(&item("song.mp3", 16)).await, PlayableReference::Placeholder);
        let direct = MediaFileDescriptor::direct("7", "https://cdn/7.jpg", "Seven", MediaKind::Image, 1);
        assert_eq!(f.orchestrator.resolve(&direct).await, PlayableReference::Remote("https://cdn/7.jpg".into()));
        let local = MediaFileDescriptor::local("/sdcard/a.jpg", 1);
        assert_eq!(f.orchestrator.resolve(&local).await, PlayableReference::Local("/sdcard/a.jpg".into()));
        assert_eq!(f.transport.connect_attempts().len(), 0);
    }

    #[tokio::test]
    async fn test_eager_failure_degrades_to_placeholder() {
        let f = fixture(server());
        let resolved = f.orchestrator.resolve(&item("missing.png", 10)).await;
        assert_eq!(resolved, PlayableReference::Placeholder);
        assert_eq!(f.transport.open_sessions(), 0);
        assert!(f.orchestrator.store().entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_materialize_failures_are_none() {
        let f = fixture(server());
        let marker = CacheMarker::new(SourcePath::new("nas", "media", "gone.mp4"));
        assert_eq!(f.orchestrator.materialize(&marker).await, None);
        let unknown_host = CacheMarker::new(SourcePath::new("elsewhere", "media", "a.mp4"));
        assert_eq!(f.orchestrator.materialize(&unknown_host).await, None);
        assert_eq!(f.orchestrator.materialize_str("not a marker").await, None);
        assert_eq!(f.transport.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_registered_credentials_are_used() {
        let alice = Credentials::new(None, Some("alice"), Some("pw"));
        let f = fixture(server().requiring(alice.clone()));
        let marker = CacheMarker::new(SourcePath::new("nas", "media", "movie.mp4"));
        assert_eq!(f.orchestrator.materialize(&marker).await, None);

        f.orchestrator.register_endpoint(&ServerEndpoint::new("NAS").unwrap().with_credentials(alice));
        assert!(f.orchestrator.materialize(&marker).await.is_some());
    }

    #[tokio::test]
    async fn test_resolve_all_preserves_order() {
        let f = fixture(server());
        let items = [item("movie.mp4", 1024), item("small.png", 2 * MIB), item("song.mp3", 16)];
        let resolved = f.orchestrator.resolve_all(&items).await;
        assert!(matches!(resolved[0], PlayableReference::Deferred(_)));
        assert!(matches!(resolved[1], PlayableReference::Local(_)));
        assert_eq!(resolved[2], PlayableReference::Placeholder);
    }

    #[tokio::test]
    async fn test_prefetch_around_warms_neighbouring_images() {
        let mut server = MockServer::new();
        for i in 0..8 {
            server = server.with_file("media", &format!("{i}.jpg"), vec![0; 16]);
        }
        let f = fixture(server.with_file("media", "clip.mp4", vec![0; 16]));
        let deferred = |name: &str| PlayableReference::Deferred(CacheMarker::new(SourcePath::new("nas", "media", name)));
        let mut items: Vec<_> = (0..8).map(|i| deferred(&format!("{i}.jpg"))).collect();
        // Videos are never prefetched.
        items[5] = deferred("clip.mp4");

        let warmed = f.orchestrator.prefetch_around(&items, 3).await;
        // 4, 6 and 1, 2 (5 is a video; 7 and 0 are out of range of the offsets).
        assert_eq!(warmed, 4);
        assert_eq!(f.transport.files_read(), 4);

        let warmed = f.orchestrator.prefetch_around(&items, 0).await;
        // 1 and 2 are already cached, only 3 is fetched; nothing before the first item.
        assert_eq!(warmed, 3);
        assert_eq!(f.transport.files_read(), 5);
    }
}
