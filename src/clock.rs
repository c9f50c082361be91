//! Time sources for cache expiry checks
//!
//! The cache never calls `Utc::now()` directly. It asks a [`Clock`], which is
//! the wall clock in production and a [`ManualClock`] in tests, so expiry can
//! be exercised without sleeping.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex, PoisonError};

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Returns the current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source backed by `Utc::now()`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Simulated clock that only moves when told to
///
/// Clones share the same underlying instant, so a clock handed to a cache can
/// still be advanced from the test that created it.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a clock frozen at the given instant
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Creates a clock frozen at the given epoch milliseconds
    ///
    /// Out-of-range values clamp to the Unix epoch.
    pub fn at_millis(epoch_ms: i64) -> Self {
        Self::new(from_epoch_millis(epoch_ms).unwrap_or(DateTime::UNIX_EPOCH))
    }

    /// Moves the clock to an absolute instant
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    /// Moves the clock forward by `ms` milliseconds
    pub fn advance(&self, ms: i64) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += Duration::milliseconds(ms);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Converts epoch milliseconds into a UTC timestamp
pub fn from_epoch_millis(epoch_ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(epoch_ms).single()
}

/// `instant + delta`, clamped to the representable range instead of panicking
pub fn saturating_add(instant: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    instant.checked_add_signed(delta).unwrap_or(if delta < Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// `instant - delta`, clamped to the representable range instead of panicking
///
/// A result clamped to the minimum reads as already expired.
pub fn saturating_sub(instant: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    instant.checked_sub_signed(delta).unwrap_or(if delta < Duration::zero() {
        DateTime::<Utc>::MAX_UTC
    } else {
        DateTime::<Utc>::MIN_UTC
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_frozen_until_advanced() {
        let clock = ManualClock::at_millis(1_000);
        assert_eq!(clock.now().timestamp_millis(), 1_000);
        assert_eq!(clock.now().timestamp_millis(), 1_000);

        clock.advance(6_000);
        assert_eq!(clock.now().timestamp_millis(), 7_000);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::at_millis(0);
        let handle = clock.clone();

        handle.advance(250);

        assert_eq!(clock.now().timestamp_millis(), 250);
    }

    #[test]
    fn test_manual_clock_set_moves_backwards_too() {
        let clock = ManualClock::at_millis(10_000);
        clock.set(from_epoch_millis(2_000).unwrap());
        assert_eq!(clock.now().timestamp_millis(), 2_000);
    }

    #[test]
    fn test_system_clock_tracks_wall_time() {
        let before = Utc::now();
        let now = SystemClock.now();
        let after = Utc::now();

        assert!(now >= before);
        assert!(now <= after);
    }

    #[test]
    fn test_saturating_add_clamps_to_max() {
        let now = from_epoch_millis(1_700_000_000_000).unwrap();
        assert_eq!(saturating_add(now, Duration::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(saturating_add(now, Duration::MIN), DateTime::<Utc>::MIN_UTC);
        assert_eq!(
            saturating_add(now, Duration::seconds(5)).timestamp_millis(),
            1_700_000_005_000
        );
    }

    #[test]
    fn test_saturating_sub_clamps_to_min() {
        let start = DateTime::<Utc>::MIN_UTC + Duration::seconds(1);
        assert_eq!(saturating_sub(start, Duration::seconds(10)), DateTime::<Utc>::MIN_UTC);
        assert_eq!(saturating_sub(start, Duration::seconds(1)), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_from_epoch_millis_roundtrips() {
        let ts = from_epoch_millis(1_700_000_000_123).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_123);
    }
}
