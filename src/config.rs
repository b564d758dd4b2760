//! Configuration for the sync engine.
//!
//! This module provides the [`Config`] struct holding endpoints, timeouts,
//! book depth, buffering limits and backoff policies.

use std::time::Duration;

use url::Url;

use crate::client::backoff::BackoffConfig;
use crate::error::Error;

/// Default number of levels per side requested in a snapshot
pub const DEFAULT_DEPTH: u32 = 60;

/// Configuration for the order book sync engine
///
/// # Example
///
/// ```rust
/// use orderbook_sync::Config;
///
/// let config = Config::new("https://api.example.com", "wss://api.example.com/ws");
///
/// // Custom timeout and depth
/// let config = Config::new("https://api.example.com", "wss://api.example.com/ws")
///     .with_request_timeout(std::time::Duration::from_secs(5))
///     .with_depth(20);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the REST API
    rest_base_url: String,

    /// URL of the stream endpoint
    websocket_url: String,

    /// HTTP request timeout
    request_timeout: Duration,

    /// Stream connect/handshake timeout
    connect_timeout: Duration,

    /// Levels per side requested in a snapshot
    depth: u32,

    /// Updates held while waiting for a snapshot
    max_buffered_updates: usize,

    /// Stream reconnection policy
    reconnect: BackoffConfig,

    /// Snapshot fetch retry policy
    snapshot_retry: BackoffConfig,

    /// Capacity of the notification channel
    notification_capacity: usize,
}

impl Config {
    /// Create a new configuration with the two endpoints
    ///
    /// # Arguments
    ///
    /// * `rest_base_url` - Base URL the `/markets/{id}/orderbook` path is appended to
    /// * `websocket_url` - Stream endpoint (`ws://` or `wss://`)
    pub fn new(rest_base_url: impl Into<String>, websocket_url: impl Into<String>) -> Self {
        Self {
            rest_base_url: rest_base_url.into(),
            websocket_url: websocket_url.into(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            depth: DEFAULT_DEPTH,
            max_buffered_updates: 1024,
            reconnect: BackoffConfig::default().max_retries(0),
            snapshot_retry: BackoffConfig::default().max_retries(3),
            notification_capacity: 64,
        }
    }

    /// Set the HTTP request timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the stream connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the snapshot depth (levels per side)
    #[must_use]
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Set how many updates may be buffered while a snapshot is pending
    #[must_use]
    pub fn with_max_buffered_updates(mut self, max: usize) -> Self {
        self.max_buffered_updates = max;
        self
    }

    /// Set the stream reconnection policy
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: BackoffConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the snapshot retry policy
    #[must_use]
    pub fn with_snapshot_retry(mut self, retry: BackoffConfig) -> Self {
        self.snapshot_retry = retry;
        self
    }

    /// Set the notification channel capacity
    #[must_use]
    pub fn with_notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity;
        self
    }

    /// Check that both endpoints parse and numeric settings are usable
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<(), Error> {
        let rest = Url::parse(&self.rest_base_url)?;
        if !matches!(rest.scheme(), "http" | "https") || rest.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "REST base URL must be http(s): {}",
                self.rest_base_url
            )));
        }

        let ws = Url::parse(&self.websocket_url)?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(Error::Config(format!(
                "WebSocket URL must be ws(s): {}",
                self.websocket_url
            )));
        }

        if self.depth == 0 {
            return Err(Error::Config("depth must be positive".to_string()));
        }
        if self.notification_capacity == 0 {
            return Err(Error::Config(
                "notification capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the REST API base URL
    pub fn rest_base_url(&self) -> &str {
        &self.rest_base_url
    }

    /// Get the WebSocket URL
    pub fn websocket_url(&self) -> &str {
        &self.websocket_url
    }

    /// Get the HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Get the stream connect timeout
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Get the snapshot depth
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Get the update buffer bound
    pub fn max_buffered_updates(&self) -> usize {
        self.max_buffered_updates
    }

    /// Get the reconnection policy
    pub fn reconnect(&self) -> &BackoffConfig {
        &self.reconnect
    }

    /// Get the snapshot retry policy
    pub fn snapshot_retry(&self) -> &BackoffConfig {
        &self.snapshot_retry
    }

    /// Get the notification channel capacity
    pub fn notification_capacity(&self) -> usize {
        self.notification_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::new("https://api.test", "wss://api.test/ws");
        assert_eq!(config.rest_base_url(), "https://api.test");
        assert_eq!(config.depth(), 60);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.reconnect().max_retries, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = Config::new("http://localhost:3000", "ws://localhost:3001")
            .with_request_timeout(Duration::from_secs(2))
            .with_connect_timeout(Duration::from_secs(1))
            .with_depth(10)
            .with_max_buffered_updates(8)
            .with_snapshot_retry(BackoffConfig::new().max_retries(1))
            .with_notification_capacity(4);

        assert_eq!(config.request_timeout(), Duration::from_secs(2));
        assert_eq!(config.connect_timeout(), Duration::from_secs(1));
        assert_eq!(config.depth(), 10);
        assert_eq!(config.max_buffered_updates(), 8);
        assert_eq!(config.snapshot_retry().max_retries, 1);
        assert_eq!(config.notification_capacity(), 4);
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        assert!(Config::new("not a url", "ws://x").validate().is_err());
        assert!(Config::new("https://x", "https://x").validate().is_err());
        assert!(Config::new("https://x", "wss://x")
            .with_depth(0)
            .validate()
            .is_err());
    }
}
