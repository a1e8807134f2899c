//! Lanfeed Library
//!
//! Decides how each media item reaches the viewer and makes it happen:
//! small share images are cached while listing, large ones and videos are
//! handed out as [`CacheMarker`]s and fetched on first access, and nearby
//! images are prefetched while the user swipes. [`MediaService`] ties this
//! together with share discovery and directory walking.

pub mod error;
mod marker;
mod orchestrator;
mod policy;
mod service;

pub use crate::marker::CacheMarker;
pub use crate::orchestrator::{OnDemandCacheOrchestrator, PREFETCH_OFFSETS, PlayableReference, RESOLVE_CONCURRENCY};
pub use crate::policy::{CachePolicy, EAGER_IMAGE_LIMIT};
pub use crate::service::{MediaService, NetworkSource};
