//! Stream URL resolution
//!
//! A playable URL is issued by an external service and is only good for a
//! limited time. This module defines the [`StreamResolver`] seam the manager
//! calls on a cache miss, plus the GraphQL-over-HTTP implementation used in
//! production.

pub mod graphql;

pub use graphql::GraphqlResolver;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A stream URL as issued by the resolution service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    /// Playable media URL
    pub url: String,
    /// Expiry stated by the service, if it stated one
    pub expires_at: Option<DateTime<Utc>>,
}

impl ResolvedStream {
    /// Creates a resolved stream without an explicit expiry
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expires_at: None,
        }
    }

    /// Attaches an explicit expiry
    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Errors that can occur when resolving a stream URL
#[derive(Debug, Error)]
pub enum ResolveError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("Stream service returned HTTP {0}")]
    Status(u16),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// GraphQL layer reported errors
    #[error("Stream service error: {}", .0.join("; "))]
    Graphql(Vec<String>),

    /// Missing expected field in response
    #[error("Missing expected field in response: {0}")]
    MissingField(String),

    /// Expiry could not be interpreted as a timestamp
    #[error("Invalid expiry timestamp: {0}")]
    InvalidExpiry(String),
}

/// Resolves a track id to a playable stream URL
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Fetches a fresh stream URL for `track_id`
    async fn resolve(&self, track_id: &str) -> Result<ResolvedStream, ResolveError>;
}
