//! SMB share discovery for the media feed.
//!
//! - **Transport seam** ([`SmbTransport`], [`SmbSession`]) with an
//!   implementation over OS-mounted shares and an in-memory mock (feature
//!   `mock`)
//! - **Protocol detection** ([`ProtocolDetector`]): SMB2+ or SMB1, probed once
//!   per host
//! - **Share enumeration** ([`ShareEnumerator`]) with well-known-name and
//!   placeholder fallbacks
//! - **Directory walking** ([`DirectoryWalker`]) producing media descriptors

pub mod detect;
mod endpoint;
pub mod error;
mod path;
pub mod shares;
pub mod transport;
pub mod walk;

pub use crate::detect::{ProtocolCapability, ProtocolDetector};
pub use crate::endpoint::{Credentials, GUEST_USERNAME, ServerEndpoint};
pub use crate::path::{split_share, validate as validate_path};
pub use crate::shares::{ShareDescriptor, ShareEnumerator};
pub use crate::transport::{SmbSession, SmbTransport, Timeouts, TransportHandle};
pub use crate::walk::{BrowseItem, DirectoryEntry, DirectoryWalker};
