use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use lanfeed_cache::CacheKey;
use lanfeed_media::SourcePath;
use std::fmt;
use std::str::FromStr;

const MARKER_SCHEME: &str = "smb-cache://";

/// Reference to a share file that has not been cached yet.
///
/// Rendered as `smb-cache://host/share/path`, so it can travel through
/// layers that only know about URLs and be turned back into a source later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheMarker(SourcePath);
impl CacheMarker {
    pub fn new(source: SourcePath) -> Self {
        Self(source)
    }

    pub fn source(&self) -> &SourcePath {
        &self.0
    }

    /// Cache key the file is (or will be) stored under.
    pub fn key(&self) -> CacheKey {
        CacheKey::for_url(&self.0.url(), self.0.file_name())
    }

    /// Whether `text` looks like a marker (no validation beyond the scheme).
    pub fn is_marker(text: &str) -> bool {
        text.starts_with(MARKER_SCHEME)
    }
}
impl fmt::Display for CacheMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{MARKER_SCHEME}{}", self.0.location())
    }
}
impl FromStr for CacheMarker {
    type Err = exn::Exn<ErrorKind>;

    fn from_str(s: &str) -> Result<Self> {
        let location = s.strip_prefix(MARKER_SCHEME).ok_or_raise(|| ErrorKind::InvalidMarker(s.into()))?;
        let source = SourcePath::from_location(location).or_raise(|| ErrorKind::InvalidMarker(s.into()))?;
        if source.path.is_empty() {
            exn::bail!(ErrorKind::InvalidMarker(s.to_string()));
        }
        Ok(Self(source))
    }
}
