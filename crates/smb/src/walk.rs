//! Directory walking.
//!
//! SMB listings do not reliably say which entries are directories, so the
//! walker asks the only question the server always answers: "can I list it?"
//! That question lives in exactly one place,
//! [`DirectoryWalker::probe_is_directory()`].

use crate::error::Result;
use crate::path::{join, parent, validate as validate_path};
use crate::transport::{RawEntry, SmbSession};
use async_stream::stream;
use futures::stream::{self, BoxStream, StreamExt};
use lanfeed_media::{MediaFileDescriptor, SourcePath, is_media};
use std::cmp::Ordering;
use tracing::instrument;

/// Directory probes issued concurrently while listing one folder.
const PROBE_CONCURRENCY: usize = 8;

/// An entry of a share directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub is_directory: bool,
    /// Path relative to the share root, `/`-separated.
    pub full_path: String,
}

/// A row in an interactive folder browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseItem {
    /// Leave the share and go back to choosing one (shown at the share root).
    SharesRoot,
    /// Go up one level, to the contained path.
    Parent(String),
    Entry(DirectoryEntry),
}
impl BrowseItem {
    /// Text shown for the row.
    pub fn label(&self) -> &str {
        match self {
            Self::SharesRoot => "← Back to shares",
            Self::Parent(_) => "..",
            Self::Entry(entry) => &entry.name,
        }
    }
}

/// Walks directories of one share over an open session.
pub struct DirectoryWalker<'a> {
    session: &'a dyn SmbSession,
    host: String,
    share: String,
}
impl<'a> DirectoryWalker<'a> {
    pub fn new(session: &'a dyn SmbSession, host: impl Into<String>, share: impl Into<String>) -> Self {
        Self { session, host: host.into(), share: share.into() }
    }

    /// Whether `path` is a directory, decided by trying to list it.
    ///
    /// A directory the user may not list is indistinguishable from a file
    /// here and is reported as `false`.
    pub async fn probe_is_directory(&self, path: &str) -> bool {
        self.session.list(&self.share, path).await.is_ok()
    }

    /// List a directory: directories first, then files, each group sorted by
    /// name. `.` and `..` are never included.
    #[instrument(skip(self), fields(share = %self.share))]
    pub async fn list(&self, path: &str) -> Result<Vec<DirectoryEntry>> {
        let path = validate_path(path)?;
        let raw = self.session.list(&self.share, &path).await?;
        let mut entries: Vec<DirectoryEntry> = stream::iter(raw.into_iter().filter(|entry| !entry.is_dot()))
            .map(|entry| {
                let full_path = join(&path, &entry.name);
                async move {
                    let is_directory = self.probe_is_directory(&full_path).await;
                    DirectoryEntry { name: entry.name, is_directory, full_path }
                }
            })
            .buffered(PROBE_CONCURRENCY)
            .collect()
            .await;
        entries.sort_by(|a, b| match (a.is_directory, b.is_directory) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.name.cmp(&b.name),
        });
        Ok(entries)
    }

    /// Like [`list()`](Self::list), with a navigation row in front: back to
    /// the share list at the share root, up one level anywhere else.
    pub async fn browse(&self, path: &str) -> Result<Vec<BrowseItem>> {
        let normalized = validate_path(path)?;
        let entries = self.list(&normalized).await?;
        let navigation = match normalized.is_empty() {
            true => BrowseItem::SharesRoot,
            false => BrowseItem::Parent(parent(&normalized).to_string()),
        };
        Ok(std::iter::once(navigation).chain(entries.into_iter().map(BrowseItem::Entry)).collect())
    }

    /// Media files under `path`, as descriptors of source `source_id`.
    ///
    /// Non-recursive walks only look at the folder itself. Recursive walks go
    /// depth-first; a folder that cannot be listed contributes nothing and
    /// the walk carries on. An unlistable starting folder yields nothing.
    pub fn media_stream(&self, path: &str, recursive: bool, source_id: &str) -> BoxStream<'_, MediaFileDescriptor> {
        let start = match validate_path(path) {
            Ok(start) => start,
            Err(err) => {
                tracing::warn!(error = %err, "refusing to walk invalid path");
                return Box::pin(stream::empty());
            },
        };
        let source_id = source_id.to_string();
        let mut stack = vec![start];

        Box::pin(stream! {
            while let Some(current) = stack.pop() {
                let listing = match self.session.list(&self.share, &current).await {
                    Ok(listing) => listing,
                    Err(err) => {
                        tracing::warn!(share = %self.share, path = %current, error = %err, "skipping folder");
                        continue;
                    },
                };
                let mut subdirectories = Vec::new();
                for entry in listing.into_iter().filter(|entry| !entry.is_dot()) {
                    let full_path = join(&current, &entry.name);
                    // Non-recursive walks only need to rule out directories
                    // that happen to have a media-like name.
                    if !recursive && !is_media(&entry.name) {
                        continue;
                    }
                    if self.probe_is_directory(&full_path).await {
                        if recursive {
                            subdirectories.push(full_path);
                        }
                        continue;
                    }
                    if is_media(&entry.name) {
                        yield self.descriptor(&source_id, full_path, &entry);
                    }
                }
                // Reversed so that folders are visited in listing order.
                stack.extend(subdirectories.into_iter().rev());
            }
        })
    }

    /// Collect [`media_stream()`](Self::media_stream).
    #[instrument(skip(self), fields(share = %self.share))]
    pub async fn media(&self, path: &str, recursive: bool, source_id: &str) -> Vec<MediaFileDescriptor> {
        let media: Vec<_> = self.media_stream(path, recursive, source_id).collect().await;
        tracing::debug!(count = media.len(), "found media files");
        media
    }

    fn descriptor(&self, source_id: &str, full_path: String, entry: &RawEntry) -> MediaFileDescriptor {
        let source = SourcePath::new(self.host.clone(), self.share.clone(), full_path);
        MediaFileDescriptor::from_share(source_id, source, entry.size)
    }
}
