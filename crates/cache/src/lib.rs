//! On-disk cache for media fetched from network shares.
//!
//! Cached files live flat in a single directory and are named after a BLAKE3
//! hash of their source URL ([`CacheKey`]). There is no index: the directory
//! listing *is* the cache state, and deleting the directory is always safe.
//!
//! # Budget
//! - Total size is capped (500 MiB by default). Once exceeded, the oldest 30%
//!   of entries are evicted before the next write.
//! - Writes are refused when the volume has less than 100 MiB free.
//! - Entries older than 24 hours are treated as missing and re-fetched.

pub mod error;
mod key;
mod store;

pub use crate::key::CacheKey;
pub use crate::store::{CACHE_DIR_NAME, CacheEntry, CacheSettings, CacheStore, CacheUsage, EvictionReport};
