//! Cache module for resolved stream URLs
//!
//! This module keeps playable stream URLs in memory keyed by track id, each
//! with an absolute expiry. Expired entries read as a cache miss, which is the
//! signal for the caller to resolve a fresh URL. Memory is reclaimed by a
//! periodic sweep rather than on the read path.

mod store;

pub use store::{CacheEntry, CacheStats, SharedStreamUrlCache, StreamUrlCache};
