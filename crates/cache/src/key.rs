use crate::error::{ErrorKind, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const HASH_LEN: usize = blake3::OUT_LEN * 2;

/// Name of a cached file: BLAKE3 hex digest of the source URL, followed by
/// the original file's extension (lower-cased) when it has one.
///
/// Keys are deterministic, so the same source always lands on the same cache
/// file without an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);
impl CacheKey {
    /// # Examples
    ///
    /// ```
    /// use lanfeed_cache::CacheKey;
    ///
    /// let key = CacheKey::for_url("smb://nas/media/beach.JPG", "beach.JPG");
    /// assert!(key.as_str().ends_with(".jpg"));
    /// assert_eq!(key, CacheKey::for_url("smb://nas/media/beach.JPG", "beach.JPG"));
    /// assert_ne!(key, CacheKey::for_url("smb://nas/media/other.JPG", "beach.JPG"));
    /// ```
    pub fn for_url(url: &str, file_name: &str) -> Self {
        let hash = blake3::hash(url.as_bytes()).to_hex();
        let extension = Path::new(file_name).extension().map(|ext| ext.to_string_lossy().to_lowercase());
        match extension {
            Some(ext) if Self::valid_extension(&ext) => Self(format!("{hash}.{ext}")),
            _ => Self(hash.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hash part of the key.
    pub fn hash(&self) -> &str {
        &self.0[..HASH_LEN]
    }

    fn valid_extension(ext: &str) -> bool {
        !ext.is_empty() && ext.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    }
}
impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
impl FromStr for CacheKey {
    type Err = exn::Exn<ErrorKind>;

    /// Parse a file name found in the cache directory.
    fn from_str(s: &str) -> Result<Self> {
        let (hash, extension) = match s.split_once('.') {
            Some((hash, ext)) => (hash, Some(ext)),
            None => (s, None),
        };
        let hash_ok = hash.len() == HASH_LEN && hash.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !hash_ok || !extension.is_none_or(Self::valid_extension) {
            exn::bail!(ErrorKind::InvalidKey(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_extension_is_lowercased() {
        let key = CacheKey::for_url("smb://nas/media/clip.MP4", "clip.MP4");
        assert_eq!(key.as_str().len(), HASH_LEN + 4);
        assert!(key.as_str().ends_with(".mp4"));
        assert_eq!(key.hash().len(), HASH_LEN);
    }

    #[test]
    fn test_no_extension() {
        let key = CacheKey::for_url("smb://nas/media/README", "README");
        assert_eq!(key.as_str().len(), HASH_LEN);
        assert!(!key.as_str().contains('.'));
    }

    #[test]
    fn test_parse_own_output() {
        let key = CacheKey::for_url("smb://nas/media/a.png", "a.png");
        assert_eq!(key.as_str().parse::<CacheKey>().unwrap(), key);
    }

    #[rstest]
    #[case("")]
    #[case("abc.jpg")]
    #[case(".tmp-1234")]
    #[case("0123456789abcdef0123456789abcdef0123456789abcdef0123456789ABCDEF.jpg")]
    #[case("0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef.")]
    #[case("0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef.tar.gz")]
    fn test_parse_rejects(#[case] input: &str) {
        let err = input.parse::<CacheKey>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(_)));
    }
}
