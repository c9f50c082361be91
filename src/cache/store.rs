//! In-memory stream URL cache with absolute expiry timestamps
//!
//! Provides a `StreamUrlCache` that maps track ids to playable URLs. Reads
//! treat expired entries as absent without removing them; reclaiming memory
//! is left to [`StreamUrlCache::sweep`], which the sweeper runs on a timer.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

use crate::clock::{saturating_add, Clock, SystemClock};

/// Cache shared between the URL manager and the background sweeper
pub type SharedStreamUrlCache = Arc<Mutex<StreamUrlCache>>;

/// A resolved stream URL and the instant it stops being trusted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Track the URL plays
    pub track_id: String,
    /// Playable media URL
    pub url: String,
    /// First instant at which the URL is considered stale
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether the entry may still be served at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Counters describing how the cache has been used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads that returned a URL
    pub hits: u64,
    /// Reads that found nothing or only a stale entry
    pub misses: u64,
    /// Entries removed by sweeps
    pub swept: u64,
}

/// Process-scoped cache of playable stream URLs keyed by track id
///
/// Entries are replaced wholesale on every `put`; there is no partial update.
pub struct StreamUrlCache {
    entries: HashMap<String, CacheEntry>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    swept: u64,
}

impl StreamUrlCache {
    /// Creates an empty cache driven by the wall clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty cache driven by a custom clock
    ///
    /// Useful for testing with a `ManualClock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            swept: 0,
        }
    }

    /// Wraps the cache for sharing with the sweeper
    pub fn into_shared(self) -> SharedStreamUrlCache {
        Arc::new(Mutex::new(self))
    }

    /// Current time according to the cache's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns the cached URL for `track_id` if it has not expired
    ///
    /// An expired entry is reported as absent but left in place.
    pub fn get(&self, track_id: &str) -> Option<String> {
        let now = self.clock.now();
        match self.entries.get(track_id) {
            Some(entry) if entry.is_valid_at(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(track_id, "stream url cache hit");
                Some(entry.url.clone())
            }
            Some(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(track_id, "stream url cache stale");
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(track_id, "stream url cache miss");
                None
            }
        }
    }

    /// Inserts or replaces the entry for `track_id`
    ///
    /// An `expires_at` in the past is accepted; the entry simply reads as absent.
    pub fn put(
        &mut self,
        track_id: impl Into<String>,
        url: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) {
        let track_id = track_id.into();
        trace!(track_id = track_id.as_str(), %expires_at, "stream url cached");
        let entry = CacheEntry {
            track_id: track_id.clone(),
            url: url.into(),
            expires_at,
        };
        self.entries.insert(track_id, entry);
    }

    /// Inserts or replaces an entry that expires `ttl` from now
    ///
    /// A TTL reaching past the representable range expires at `MAX_UTC`.
    pub fn put_with_ttl(
        &mut self,
        track_id: impl Into<String>,
        url: impl Into<String>,
        ttl: Duration,
    ) {
        let expires_at = saturating_add(self.clock.now(), ttl);
        self.put(track_id, url, expires_at);
    }

    /// Removes every entry whose `expires_at <= now` and returns how many went
    pub fn sweep(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid_at(now));
        let removed = before - self.entries.len();
        self.swept += removed as u64;
        removed
    }

    /// Returns the raw entry for `track_id`, expired or not
    pub fn entry(&self, track_id: &str) -> Option<&CacheEntry> {
        self.entries.get(track_id)
    }

    /// Iterates over all stored entries, including stale ones
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    /// Drops the entry for `track_id`, returning it if present
    pub fn remove(&mut self, track_id: &str) -> Option<CacheEntry> {
        self.entries.remove(track_id)
    }

    /// Drops every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, including stale ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the usage counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            swept: self.swept,
        }
    }
}

impl Default for StreamUrlCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StreamUrlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamUrlCache")
            .field("entries", &self.entries.len())
            .field("stats", &self.stats())
            .finish()
    }
}
