//! The media service: one object wiring discovery, walking and caching
//! together for a browse session.

use crate::error::{ErrorKind, Result};
use crate::marker::CacheMarker;
use crate::orchestrator::{OnDemandCacheOrchestrator, PlayableReference};
use exn::{OptionExt, ResultExt};
use lanfeed_cache::CacheStore;
use lanfeed_media::MediaFileDescriptor;
use lanfeed_smb::transport::SessionHandle;
use lanfeed_smb::{
    BrowseItem, DirectoryWalker, ProtocolCapability, ProtocolDetector, ServerEndpoint, ShareDescriptor,
    ShareEnumerator, Timeouts, TransportHandle, split_share,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// A configured folder on an SMB server that feeds media into the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSource {
    /// Stable identifier, part of every item's identity.
    pub id: String,
    pub endpoint: ServerEndpoint,
    /// `share` or `share/sub/folder`.
    pub path: String,
    pub include_subfolders: bool,
}
impl NetworkSource {
    /// Share name and folder inside it.
    ///
    /// Fails with [`Config`](ErrorKind::Config) when the path names no share.
    pub fn share_and_folder(&self) -> Result<(String, String)> {
        split_share(&self.path).ok_or_raise(|| ErrorKind::Config(format!("source `{}` has no share", self.id)))
    }
}

/// Entry point for everything the UI needs from the network side.
///
/// Owns the protocol detector (so capabilities are remembered for the
/// lifetime of the service), the share enumerator and the on-demand cache.
/// All network operations run under one cancellation token:
/// [`shutdown()`](Self::shutdown) aborts whatever is still in flight,
/// releasing sessions and discarding partial downloads, then empties the
/// cache.
pub struct MediaService {
    transport: TransportHandle,
    detector: Arc<ProtocolDetector>,
    enumerator: ShareEnumerator,
    orchestrator: OnDemandCacheOrchestrator,
    timeouts: Timeouts,
    cancel: CancellationToken,
}
impl MediaService {
    pub fn new(transport: TransportHandle, store: CacheStore, timeouts: Timeouts) -> Self {
        let detector = Arc::new(ProtocolDetector::new(Arc::clone(&transport), timeouts));
        let enumerator = ShareEnumerator::new(Arc::clone(&transport), Arc::clone(&detector), timeouts);
        let orchestrator =
            OnDemandCacheOrchestrator::new(Arc::clone(&transport), Arc::clone(&detector), Arc::new(store), timeouts);
        Self {
            transport,
            detector,
            enumerator,
            orchestrator,
            timeouts,
            cancel: CancellationToken::new(),
        }
    }

    pub fn orchestrator(&self) -> &OnDemandCacheOrchestrator {
        &self.orchestrator
    }

    pub fn store(&self) -> &CacheStore {
        self.orchestrator.store()
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn detect_protocol(&self, endpoint: &ServerEndpoint) -> ProtocolCapability {
        self.detector.detect(endpoint).await
    }

    /// Shares offered by the server (or placeholders explaining why there
    /// are none).
    pub async fn list_shares(&self, endpoint: &ServerEndpoint) -> Vec<ShareDescriptor> {
        self.orchestrator.register_endpoint(endpoint);
        let listing = self.enumerator.list_shares(endpoint);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Vec::new(),
            shares = listing => shares,
        }
    }

    /// One folder of a share, for interactive browsing.
    #[instrument(skip(self), fields(host = %endpoint.host()))]
    pub async fn browse(&self, endpoint: &ServerEndpoint, share: &str, path: &str) -> Result<Vec<BrowseItem>> {
        self.cancellable(async {
            let session = self.connect(endpoint).await?;
            let walker = DirectoryWalker::new(session.as_ref(), endpoint.host(), share);
            let items = walker.browse(path).await.or_raise(|| ErrorKind::Share);
            session.close().await;
            items
        })
        .await
    }

    /// Every media file of a source, honouring its subfolder setting.
    ///
    /// The source's path is checked before any I/O happens.
    #[instrument(skip(self, source), fields(source = %source.id))]
    pub async fn list_media(&self, source: &NetworkSource) -> Result<Vec<MediaFileDescriptor>> {
        let (share, folder) = source.share_and_folder()?;
        self.cancellable(async {
            let session = self.connect(&source.endpoint).await?;
            let walker = DirectoryWalker::new(session.as_ref(), source.endpoint.host(), share.as_str());
            let media = walker.media(&folder, source.include_subfolders, &source.id).await;
            session.close().await;
            tracing::info!(count = media.len(), "listed media");
            Ok(media)
        })
        .await
    }

    pub async fn resolve(&self, descriptor: &MediaFileDescriptor) -> PlayableReference {
        let resolving = self.orchestrator.resolve(descriptor);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => PlayableReference::Placeholder,
            resolved = resolving => resolved,
        }
    }

    pub async fn resolve_all(&self, descriptors: &[MediaFileDescriptor]) -> Vec<PlayableReference> {
        let resolving = self.orchestrator.resolve_all(descriptors);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => vec![PlayableReference::Placeholder; descriptors.len()],
            resolved = resolving => resolved,
        }
    }

    pub async fn materialize(&self, marker: &CacheMarker) -> Option<PathBuf> {
        let materializing = self.orchestrator.materialize(marker);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            path = materializing => path,
        }
    }

    pub async fn prefetch_around(&self, items: &[PlayableReference], index: usize) -> usize {
        let prefetching = self.orchestrator.prefetch_around(items, index);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => 0,
            cached = prefetching => cached,
        }
    }

    /// Delete every cached file. Returns how many were removed.
    pub async fn clear_cache(&self) -> Result<usize> {
        self.store().clear_all().await.or_raise(|| ErrorKind::Cache)
    }

    /// Forget what is known about servers' protocol support.
    pub fn clear_protocol_cache(&self) {
        self.detector.clear();
    }

    /// End the browse session: cancel in-flight work, then empty the cache.
    ///
    /// Every later network operation on this service is refused.
    pub async fn shutdown(&self) -> Result<usize> {
        tracing::info!("shutting down media service");
        self.cancel.cancel();
        self.clear_cache().await
    }

    /// Connect using the detected capability of the host. The endpoint is
    /// registered so later downloads use the same credentials.
    async fn connect(&self, endpoint: &ServerEndpoint) -> Result<SessionHandle> {
        self.orchestrator.register_endpoint(endpoint);
        let profile = self.detector.detect(endpoint).await.profile(self.timeouts);
        self.transport.connect(endpoint, &profile).await.or_raise(|| ErrorKind::Share)
    }

    async fn cancellable<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(exn::Exn::from(ErrorKind::Cancelled)),
            result = operation => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanfeed_cache::CacheSettings;
    use lanfeed_smb::transport::{MockServer, MockTransport};
    use std::time::Duration;
    use tempfile::TempDir;

    fn service(server: MockServer) -> (TempDir, MockTransport, MediaService) {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new().with_server("nas", server);
        let settings = CacheSettings { min_free_bytes: 0, ..CacheSettings::default() };
        let store = CacheStore::new(dir.path(), settings).unwrap();
        let service = MediaService::new(Arc::new(transport.clone()), store, Timeouts::default());
        (dir, transport, service)
    }

    fn server() -> MockServer {
        MockServer::new()
            .with_file("media", "Holiday/beach.jpg", b"jpeg")
            .with_file("media", "Holiday/Day 2/clip.mp4", b"mp4")
            .with_file("media", "Holiday/readme.txt", b"txt")
            .with_file("media", "top.png", b"png")
    }

    fn source(path: &str, include_subfolders: bool) -> NetworkSource {
        NetworkSource {
            id: "den".to_string(),
            endpoint: ServerEndpoint::new("nas").unwrap(),
            path: path.to_string(),
            include_subfolders,
        }
    }

    #[tokio::test]
    async fn test_source_without_share_is_rejected_before_io() {
        let (_dir, transport, service) = service(server());
        let err = service.list_media(&source("", true)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Config(_)));
        assert!(transport.connect_attempts().is_empty());
    }

    #[tokio::test]
    async fn test_list_media_in_subfolder() {
        let (_dir, transport, service) = service(server());
        let flat = service.list_media(&source("media/Holiday", false)).await.unwrap();
        let names: Vec<_> = flat.iter().map(|m| m.display_name.as_str()).collect();
        assert_eq!(names, vec!["beach.jpg"]);

        let deep = service.list_media(&source("media/Holiday", true)).await.unwrap();
        assert_eq!(deep.len(), 2);
        assert_eq!(transport.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_list_then_resolve_and_materialize() {
        let (_dir, transport, service) = service(server());
        let media = service.list_media(&source("media", true)).await.unwrap();
        let resolved = service.resolve_all(&media).await;
        let marker = resolved
            .iter()
            .find_map(|r| match r {
                PlayableReference::Deferred(marker) => Some(marker.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(marker.to_string(), "smb-cache://nas/media/Holiday/Day 2/clip.mp4");
        // Both images were cached eagerly, the video was not.
        assert_eq!(transport.files_read(), 2);
        let path = service.materialize(&marker).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"mp4");
        assert_eq!(service.store().usage().await.unwrap().files, 3);
    }

    #[tokio::test]
    async fn test_browse_share_root() {
        let (_dir, _transport, service) = service(server());
        let items = service.browse(&ServerEndpoint::new("nas").unwrap(), "media", "").await.unwrap();
        let labels: Vec<_> = items.iter().map(BrowseItem::label).collect();
        assert_eq!(labels, vec!["← Back to shares", "Holiday", "top.png"]);
    }

    #[tokio::test]
    async fn test_browse_unreachable_host_fails() {
        let (_dir, _transport, service) = service(server());
        let err = service.browse(&ServerEndpoint::new("ghost").unwrap(), "media", "").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Share));
    }

    #[tokio::test]
    async fn test_list_shares_and_protocol_cache() {
        let (_dir, transport, service) = service(server());
        let endpoint = ServerEndpoint::new("nas").unwrap();
        let shares = service.list_shares(&endpoint).await;
        assert_eq!(shares, vec![ShareDescriptor::accessible("media")]);
        assert_eq!(service.detect_protocol(&endpoint).await, ProtocolCapability::Smb2Plus);
        let probes = transport.connect_count("nas");

        service.clear_protocol_cache();
        service.detect_protocol(&endpoint).await;
        assert_eq!(transport.connect_count("nas"), probes + 1);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_and_clears() {
        let (_dir, transport, service) = service(server().with_connect_delay(Duration::from_millis(200)));
        let marker: CacheMarker = "smb-cache://nas/media/top.png".parse().unwrap();
        let (materialized, cleared) = tokio::join!(service.materialize(&marker), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            service.shutdown().await
        });
        assert_eq!(materialized, None);
        assert_eq!(cleared.unwrap(), 0);
        assert!(service.is_shut_down());
        assert_eq!(transport.open_sessions(), 0);

        let err = service.list_media(&source("media", false)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Cancelled));
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let (_dir, _transport, service) = service(server());
        let marker: CacheMarker = "smb-cache://nas/media/top.png".parse().unwrap();
        service.materialize(&marker).await.unwrap();
        assert_eq!(service.clear_cache().await.unwrap(), 1);
        assert_eq!(service.store().usage().await.unwrap().files, 0);
    }
}
