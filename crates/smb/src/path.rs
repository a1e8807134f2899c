//! Share-relative path validation.
//!
//! Paths handed to a transport are always relative to a share root and use
//! `/` as separator. This module normalizes user/remote input into that form
//! and prevents paths from escaping the share.

use crate::error::{ErrorKind, Result};

/// Validates and normalizes a share-relative path.
///
/// Backslashes are treated as separators (SMB's native one), empty and `.`
/// components are dropped, and `..` is resolved. An empty result is valid: it
/// refers to the share root.
///
/// # Returns
/// Returns the normalized path if valid, or [`InvalidPath`](ErrorKind::InvalidPath)
/// if it would leave the share root or contains a null byte.
///
/// # Examples
///
/// ```
/// use lanfeed_smb::validate_path;
/// // Valid paths
/// assert_eq!(validate_path("Photos/2024/beach.jpg").unwrap(), "Photos/2024/beach.jpg");
/// assert_eq!(validate_path("\\Photos\\2024\\").unwrap(), "Photos/2024");
/// assert_eq!(validate_path("a/../b").unwrap(), "b");
/// assert_eq!(validate_path("").unwrap(), "");
/// // Invalid paths
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a/../../b").is_err());
/// assert!(validate_path("a\0b").is_err());
/// ```
pub fn validate(path: &str) -> Result<String> {
    if path.contains('\0') {
        exn::bail!(ErrorKind::InvalidPath(path.replace('\0', "\\0")));
    }
    let mut components: Vec<&str> = Vec::new();
    for component in path.split(['/', '\\']) {
        match component {
            "" | "." => {},
            ".." => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.to_string()));
                }
            },
            normal => components.push(normal),
        }
    }
    Ok(components.join("/"))
}

/// Join a child name onto a (normalized) parent path.
pub fn join(parent: &str, name: &str) -> String {
    match parent.is_empty() {
        true => name.to_string(),
        false => format!("{parent}/{name}"),
    }
}

/// Parent of a (normalized) path; the parent of a top-level entry is the
/// share root (`""`).
pub fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or_default()
}

/// Split a `share/sub/dir` selection into the share name and the path inside
/// the share.
///
/// Returns `None` when no share name is present.
///
/// # Examples
///
/// ```
/// use lanfeed_smb::split_share;
///
/// assert_eq!(split_share("media/Holiday/2024").unwrap(), ("media".to_string(), "Holiday/2024".to_string()));
/// assert_eq!(split_share("/media/").unwrap(), ("media".to_string(), String::new()));
/// assert!(split_share("").is_none());
/// ```
pub fn split_share(selection: &str) -> Option<(String, String)> {
    let normalized = validate(selection).ok()?;
    let (share, rest) = normalized.split_once('/').unwrap_or((normalized.as_str(), ""));
    match share.is_empty() {
        true => None,
        false => Some((share.to_string(), rest.to_string())),
    }
}
