//! streamcache library
//!
//! Resolves time-limited stream URLs for music tracks and keeps them in a
//! process-scoped cache that is swept of expired entries on a timer.

pub mod cache;
pub mod cli;
pub mod clock;
pub mod logging;
pub mod manager;
pub mod resolver;
pub mod sweeper;

pub use cache::{CacheEntry, SharedStreamUrlCache, StreamUrlCache};
pub use manager::{ManagerConfig, StreamUrlManager};
pub use resolver::{GraphqlResolver, ResolveError, ResolvedStream, StreamResolver};
pub use sweeper::{SweepConfig, SweepHandle, SweepMessage};
