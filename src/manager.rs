//! Stream URL manager
//!
//! Sits between playback code and the resolution service: a valid cached URL
//! is returned straight away, a miss is resolved and written back into the
//! cache. Retries and user-facing error reporting stay with the caller.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::join_all;
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{SharedStreamUrlCache, StreamUrlCache};
use crate::clock::{saturating_add, saturating_sub};
use crate::resolver::{ResolveError, ResolvedStream, StreamResolver};

/// TTL applied when the service does not state an expiry
pub const DEFAULT_STREAM_TTL: Duration = Duration::from_secs(300);

/// Taken off a service-stated expiry so playback never starts on a dying URL
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::from_secs(10);

/// Expiry policy for resolved URLs
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Lifetime assumed when the service gives no `expiresAt`
    pub default_ttl: Duration,
    /// Safety margin subtracted from a service-stated expiry
    pub expiry_margin: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_STREAM_TTL,
            expiry_margin: DEFAULT_EXPIRY_MARGIN,
        }
    }
}

/// Resolves playable URLs through a shared cache
#[derive(Clone)]
pub struct StreamUrlManager {
    cache: SharedStreamUrlCache,
    resolver: Arc<dyn StreamResolver>,
    config: ManagerConfig,
}

impl StreamUrlManager {
    /// Creates a manager over an existing shared cache
    pub fn new(
        cache: SharedStreamUrlCache,
        resolver: Arc<dyn StreamResolver>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            cache,
            resolver,
            config,
        }
    }

    /// Creates a manager with a fresh wall-clock cache and default policy
    pub fn with_resolver(resolver: Arc<dyn StreamResolver>) -> Self {
        Self::new(StreamUrlCache::new().into_shared(), resolver, ManagerConfig::default())
    }

    /// The cache this manager reads and writes
    pub fn cache(&self) -> &SharedStreamUrlCache {
        &self.cache
    }

    fn lock_cache(&self) -> MutexGuard<'_, StreamUrlCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a playable URL for `track_id`, resolving it on a cache miss
    ///
    /// A resolver failure is returned as-is and leaves the cache untouched.
    pub async fn playable_url(&self, track_id: &str) -> Result<String, ResolveError> {
        if let Some(url) = self.lock_cache().get(track_id) {
            return Ok(url);
        }

        let resolved = self
            .resolver
            .resolve(track_id)
            .await
            .inspect_err(|e| warn!(track_id, error = %e, "stream url resolution failed"))?;

        let mut cache = self.lock_cache();
        let expires_at = self.expiry_for(&resolved, cache.now());
        info!(track_id, %expires_at, "stream url resolved");
        cache.put(track_id, resolved.url.clone(), expires_at);

        Ok(resolved.url)
    }

    /// Resolves several tracks concurrently, keeping input order
    pub async fn playable_urls(&self, track_ids: &[String]) -> Vec<Result<String, ResolveError>> {
        join_all(track_ids.iter().map(|id| self.playable_url(id))).await
    }

    /// Warms the cache for `track_id` in a detached task
    ///
    /// The result is cached even if nobody awaits the returned handle.
    pub fn prefetch(&self, track_id: impl Into<String>) -> JoinHandle<()> {
        let track_id = track_id.into();
        let this = self.clone();
        tokio::spawn(async move {
            // Failures are already logged by playable_url
            let _ = this.playable_url(&track_id).await;
        })
    }

    /// Drops any cached URL for `track_id`
    ///
    /// Returns whether an entry was present.
    pub fn invalidate(&self, track_id: &str) -> bool {
        let removed = self.lock_cache().remove(track_id).is_some();
        if removed {
            info!(track_id, "stream url invalidated");
        }
        removed
    }

    /// Expiry to store for a freshly resolved stream
    ///
    /// Results outside chrono's range clamp; a clamp to the minimum reads as expired.
    fn expiry_for(&self, resolved: &ResolvedStream, now: DateTime<Utc>) -> DateTime<Utc> {
        match resolved.expires_at {
            Some(stated) => saturating_sub(stated, to_chrono(self.config.expiry_margin)),
            None => saturating_add(now, to_chrono(self.config.default_ttl)),
        }
    }
}

fn to_chrono(duration: Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::MAX)
}
