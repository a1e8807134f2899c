//! Media classification with extension-based detection.
//!
//! This crate answers one question for the rest of the workspace: "is this
//! file something the feed can show, and what kind of thing is it?"
//!
//! - **Classification** from file names ([`MediaKind::from_name`],
//!   [`MediaKind::from_path`]) using fixed, case-insensitive extension sets
//! - **Descriptors** ([`MediaFileDescriptor`]) that carry everything the
//!   cache layer needs to know about an item: where it came from, how big it
//!   is, and a stable identity
//!
//! No I/O happens here. Everything is pure and trivially testable.

mod descriptor;
pub mod error;
mod kind;

pub use crate::descriptor::{MediaFileDescriptor, MediaOrigin, SourcePath};
pub use crate::kind::is_media;

/// The kind of media a file contains, judged by its extension.
///
/// Defaults to [`Unknown`](Self::Unknown) (not displayable).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Still images (.jpg, .jpeg, .png, .gif, .bmp, .webp)
    Image,
    /// Video containers (.mp4, .avi, .mkv, .mov, .wmv, .flv, .webm)
    Video,
    /// Audio files (.mp3, .wav, .flac, .aac, .ogg, .m4a)
    Audio,
    /// Anything else
    #[default]
    Unknown,
}

#[cfg(test)]
mod tests {
    use crate::MediaKind;

    #[test]
    fn media_kind_default() {
        assert_eq!(MediaKind::default(), MediaKind::Unknown);
    }
}
