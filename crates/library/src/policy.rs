use lanfeed_media::{MediaFileDescriptor, MediaKind, MediaOrigin};

/// Images smaller than this are cached while listing.
pub const EAGER_IMAGE_LIMIT: u64 = 10 * 1024 * 1024;

/// How an item in a listing gets to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Cache right away, during the listing.
    Eager,
    /// Cache on first access.
    Lazy,
    /// Not displayable; show a generic placeholder.
    Placeholder,
    /// Served by URL; the cache is not involved.
    Bypass,
    /// Already on local storage.
    Local,
}
impl CachePolicy {
    /// Decide the policy for an item. Pure: depends only on the descriptor.
    ///
    /// # Examples
    ///
    /// ```
    /// use lanfeed_library::CachePolicy;
    /// use lanfeed_media::{MediaFileDescriptor, SourcePath};
    ///
    /// let photo = MediaFileDescriptor::from_share("nas", SourcePath::new("nas", "media", "a.png"), 2 << 20);
    /// assert_eq!(CachePolicy::for_descriptor(&photo), CachePolicy::Eager);
    /// let movie = MediaFileDescriptor::from_share("nas", SourcePath::new("nas", "media", "a.mp4"), 50 << 20);
    /// assert_eq!(CachePolicy::for_descriptor(&movie), CachePolicy::Lazy);
    /// ```
    pub fn for_descriptor(descriptor: &MediaFileDescriptor) -> Self {
        match &descriptor.origin {
            MediaOrigin::Direct(_) => return Self::Bypass,
            MediaOrigin::Local(_) => return Self::Local,
            MediaOrigin::Share(_) => {},
        }
        match descriptor.kind {
            MediaKind::Image if descriptor.size_bytes < EAGER_IMAGE_LIMIT => Self::Eager,
            MediaKind::Image | MediaKind::Video => Self::Lazy,
            MediaKind::Audio | MediaKind::Unknown => Self::Placeholder,
        }
    }
}
