//! Media descriptors.
//!
//! These types describe a single item in a listing, independent of whether
//! (or how) it has been cached.

use crate::MediaKind;
use crate::error::{ErrorKind, Result};
use std::fmt;
use std::path::PathBuf;

const SMB_SCHEME: &str = "smb://";

/// Location of a file on an SMB server.
///
/// `path` is relative to the share root and always uses `/` as separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourcePath {
    pub host: String,
    pub share: String,
    pub path: String,
}
impl SourcePath {
    pub fn new(host: impl Into<String>, share: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            share: share.into(),
            path: path.into().trim_matches('/').to_string(),
        }
    }

    /// Parse the `host/share/path` part of a URL (no scheme).
    ///
    /// # Examples
    ///
    /// ```
    /// use lanfeed_media::SourcePath;
    ///
    /// let source = SourcePath::from_location("nas/media/Holiday/beach.jpg").unwrap();
    /// assert_eq!(source.host, "nas");
    /// assert_eq!(source.share, "media");
    /// assert_eq!(source.path, "Holiday/beach.jpg");
    /// ```
    pub fn from_location(location: &str) -> Result<Self> {
        let mut parts = location.trim_start_matches('/').splitn(3, '/');
        let host = parts.next().filter(|h| !h.is_empty());
        let share = parts.next().filter(|s| !s.is_empty());
        let (Some(host), Some(share)) = (host, share) else {
            exn::bail!(ErrorKind::IncompleteSource(location.to_string()));
        };
        Ok(Self::new(host, share, parts.next().unwrap_or_default()))
    }

    /// Parse a fully-qualified `smb://host/share/path` URL.
    pub fn from_url(url: &str) -> Result<Self> {
        match url.strip_prefix(SMB_SCHEME) {
            Some(location) => Self::from_location(location),
            None => exn::bail!(ErrorKind::IncompleteSource(url.to_string())),
        }
    }

    /// The `host/share/path` location, without a scheme.
    pub fn location(&self) -> String {
        match self.path.is_empty() {
            true => format!("{}/{}", self.host, self.share),
            false => format!("{}/{}/{}", self.host, self.share, self.path),
        }
    }

    /// Fully-qualified source URL. This is what cache keys are derived from.
    pub fn url(&self) -> String {
        format!("{SMB_SCHEME}{}", self.location())
    }

    /// Last component of the path (the share name for a share root).
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().filter(|n| !n.is_empty()).unwrap_or(&self.share)
    }
}
impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Where an item's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOrigin {
    /// A file on an SMB share; goes through the on-demand cache.
    Share(SourcePath),
    /// Served directly by URL (content API items). Never cached here.
    Direct(String),
    /// Already on local storage.
    Local(PathBuf),
}

/// A single media item in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFileDescriptor {
    pub origin: MediaOrigin,
    pub display_name: String,
    pub kind: MediaKind,
    pub size_bytes: u64,
    /// Stable identity combining the source id and path. Unique within a
    /// listing and identical across re-listings of the same path.
    pub source_identity: String,
}
impl MediaFileDescriptor {
    /// Describe a file found on an SMB share.
    ///
    /// # Examples
    ///
    /// ```
    /// use lanfeed_media::{MediaFileDescriptor, MediaKind, SourcePath};
    ///
    /// let source = SourcePath::new("nas", "media", "2024/clip.MP4");
    /// let item = MediaFileDescriptor::from_share("living-room", source, 1024);
    /// assert_eq!(item.kind, MediaKind::Video);
    /// assert_eq!(item.display_name, "clip.MP4");
    /// assert_eq!(item.source_identity, "smb:living-room:media/2024/clip.MP4");
    /// ```
    pub fn from_share(source_id: &str, source: SourcePath, size_bytes: u64) -> Self {
        let display_name = source.file_name().to_string();
        let source_identity = format!("smb:{source_id}:{}/{}", source.share, source.path);
        Self {
            kind: MediaKind::from_name(&display_name),
            display_name,
            size_bytes,
            source_identity,
            origin: MediaOrigin::Share(source),
        }
    }

    /// Describe an item served by URL (e.g. the remote content API).
    pub fn direct(
        id: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        kind: MediaKind,
        size_bytes: u64,
    ) -> Self {
        Self {
            origin: MediaOrigin::Direct(url.into()),
            display_name: title.into(),
            kind,
            size_bytes,
            source_identity: id.into(),
        }
    }

    /// Describe a file already on local storage.
    pub fn local(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        let path = path.into();
        let display_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        Self {
            kind: MediaKind::from_path(&path),
            source_identity: format!("local:{}", path.display()),
            display_name,
            size_bytes,
            origin: MediaOrigin::Local(path),
        }
    }

    /// The SMB source, if this item lives on a share.
    pub fn share_source(&self) -> Option<&SourcePath> {
        match &self.origin {
            MediaOrigin::Share(source) => Some(source),
            _ => None,
        }
    }
}
