use crate::MediaKind;
use crate::error::{Error, ErrorKind};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "webp"];
const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm"];
const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "wav", "flac", "aac", "ogg", "m4a"];

impl FromStr for MediaKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            "unknown" => Ok(MediaKind::Unknown),
            _ => exn::bail!(ErrorKind::UnknownKind(s.to_string())),
        }
    }
}
impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MediaKind::Image => "Image",
            MediaKind::Video => "Video",
            MediaKind::Audio => "Audio",
            MediaKind::Unknown => "Unknown",
        })
    }
}
impl MediaKind {
    /// Classify a file by the extension of its path.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| Self::from_extension(&ext.to_lowercase()))
            .unwrap_or(MediaKind::Unknown)
    }

    /// Classify a file by name (a single path component, no separators
    /// required).
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self::from_path(Path::new(name))
    }

    fn from_extension(ext: &str) -> Self {
        if IMAGE_EXTENSIONS.contains(&ext) {
            MediaKind::Image
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            MediaKind::Video
        } else if AUDIO_EXTENSIONS.contains(&ext) {
            MediaKind::Audio
        } else {
            MediaKind::Unknown
        }
    }

    pub fn is_media(&self) -> bool {
        !matches!(self, MediaKind::Unknown)
    }
}

/// Whether a file name should be collected by a media listing.
pub fn is_media(name: &str) -> bool {
    MediaKind::from_name(name).is_media()
}

#[cfg(test)]
mod tests {
    use crate::MediaKind;
    use rstest::rstest;

    #[rstest]
    #[case("photo.JPG", MediaKind::Image)]
    #[case("photo.jpg", MediaKind::Image)]
    #[case("photo.JpEg", MediaKind::Image)]
    #[case("anim.gif", MediaKind::Image)]
    #[case("scan.BMP", MediaKind::Image)]
    #[case("still.webp", MediaKind::Image)]
    #[case("clip.MKV", MediaKind::Video)]
    #[case("clip.mp4", MediaKind::Video)]
    #[case("clip.Mov", MediaKind::Video)]
    #[case("clip.webm", MediaKind::Video)]
    #[case("track.flac", MediaKind::Audio)]
    #[case("track.M4A", MediaKind::Audio)]
    #[case("track.Ogg", MediaKind::Audio)]
    #[case("readme.txt", MediaKind::Unknown)]
    #[case("archive.tar.gz", MediaKind::Unknown)]
    #[case("no_extension", MediaKind::Unknown)]
    // A dotfile has no extension, only a (hidden) stem.
    #[case(".jpg", MediaKind::Unknown)]
    #[case("holiday.photo.png", MediaKind::Image)]
    fn test_from_name(#[case] name: &str, #[case] expected: MediaKind) {
        assert_eq!(MediaKind::from_name(name), expected);
    }

    #[rstest]
    #[case("Pictures/2024/beach.png", MediaKind::Image)]
    #[case("Videos/cat.avi", MediaKind::Video)]
    #[case("Music.mp3/notes.txt", MediaKind::Unknown)]
    fn test_from_path(#[case] path: &str, #[case] expected: MediaKind) {
        assert_eq!(MediaKind::from_path(path), expected);
    }

    #[rstest]
    #[case("image", MediaKind::Image)]
    #[case("Video", MediaKind::Video)]
    #[case("AUDIO", MediaKind::Audio)]
    #[case("unknown", MediaKind::Unknown)]
    fn test_from_str(#[case] test: &str, #[case] expected: MediaKind) {
        assert_eq!(test.parse::<MediaKind>().unwrap(), expected);
        assert_eq!(expected.to_string().parse::<MediaKind>().unwrap(), expected);
    }

    #[test]
    fn test_from_str_invalid() {
        assert!("hologram".parse::<MediaKind>().is_err());
        assert!("".parse::<MediaKind>().is_err());
    }

    #[test]
    fn test_is_media() {
        assert!(super::is_media("a.png"));
        assert!(super::is_media("a.WAV"));
        assert!(!super::is_media("a.pdf"));
        assert!(!MediaKind::Unknown.is_media());
    }
}
