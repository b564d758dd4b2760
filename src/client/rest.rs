//! REST client and order book snapshot loader.
//!
//! # Example
//!
//! ```rust,no_run
//! use orderbook_sync::client::SnapshotLoader;
//! use orderbook_sync::Config;
//!
//! # async fn example() -> orderbook_sync::Result<()> {
//! let config = Config::new("https://api.example.com", "wss://api.example.com/ws");
//! let loader = SnapshotLoader::new(&config)?;
//!
//! let snapshot = loader.fetch(1).await?;
//! println!("{} bids, {} asks", snapshot.bids.len(), snapshot.asks.len());
//! # Ok(())
//! # }
//! ```

use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::client::backoff::BackoffConfig;
use crate::config::Config;
use crate::error::{ApiError, Error};
use crate::types::market::{OrderBookSnapshot, OrderbookResponse};
use crate::types::MarketId;

/// HTTP client for the REST API
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    base_url: Url,
}

impl RestClient {
    /// Create a new REST client
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let base_url = Url::parse(config.rest_base_url())?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "REST base URL cannot carry a path: {}",
                config.rest_base_url()
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Build `{base}/{segments..}?{query..}`
    pub fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("invalid REST base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Make a GET request and decode the JSON body
    pub async fn get<T>(&self, url: Url) -> Result<T, Error>
    where
        T: serde::de::DeserializeOwned,
    {
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    /// Handle API response, checking for errors
    async fn handle_response<T>(&self, response: reqwest::Response) -> Result<T, Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000));

            return Err(Error::RateLimited { retry_after_ms });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if let Ok(error_response) = serde_json::from_str::<serde_json::Value>(&body) {
                let message = error_response
                    .get("message")
                    .or_else(|| error_response.get("error"))
                    .and_then(|v| v.as_str())
                    .unwrap_or(&body)
                    .to_string();

                let code = error_response
                    .get("code")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());

                return Err(Error::Api(ApiError {
                    status: status.as_u16(),
                    code,
                    message,
                }));
            }

            return Err(Error::Api(ApiError::new(status.as_u16(), body)));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(Error::from)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// Fetches order book snapshots, retrying transient failures
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    rest: RestClient,
    depth: u32,
    retry: BackoffConfig,
}

impl SnapshotLoader {
    /// Create a loader from the REST settings in `config`
    pub fn new(config: &Config) -> Result<Self, Error> {
        Ok(Self {
            rest: RestClient::new(config)?,
            depth: config.depth(),
            retry: config.snapshot_retry().clone(),
        })
    }

    /// Levels per side requested
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// `GET {base}/markets/{market_id}/orderbook?depth={depth}`
    pub async fn fetch_once(&self, market_id: MarketId) -> Result<OrderBookSnapshot, Error> {
        let market = market_id.to_string();
        let depth = self.depth.to_string();
        let url = self
            .rest
            .url(&["markets", market.as_str(), "orderbook"], &[("depth", depth.as_str())])?;

        let response: OrderbookResponse = self.rest.get(url).await?;
        let snapshot = response.into_snapshot(market_id);
        if !snapshot.is_well_ordered() {
            warn!(market_id, "Snapshot levels not strictly ordered");
        }
        Ok(snapshot)
    }

    /// Fetch a snapshot, retrying retryable failures with backoff
    ///
    /// # Errors
    ///
    /// Returns the last error once it is not retryable or retries run out.
    pub async fn fetch(&self, market_id: MarketId) -> Result<OrderBookSnapshot, Error> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(market_id).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if e.is_retryable() && self.retry.should_retry(attempt) => {
                    let mut delay = self.retry.delay_with_jitter(attempt);
                    if let Error::RateLimited {
                        retry_after_ms: Some(ms),
                    } = &e
                    {
                        delay = delay.max(std::time::Duration::from_millis(*ms));
                    }
                    warn!(
                        market_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Snapshot fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> RestClient {
        RestClient::new(&Config::new(base, "ws://localhost")).unwrap()
    }

    #[test]
    fn test_orderbook_url() {
        let url = client("https://api.test/v1/")
            .url(&["markets", "12", "orderbook"], &[("depth", "60")])
            .unwrap();
        assert_eq!(url.as_str(), "https://api.test/v1/markets/12/orderbook?depth=60");

        let url = client("http://localhost:8080")
            .url(&["markets", "1", "orderbook"], &[])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/markets/1/orderbook");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(RestClient::new(&Config::new("mailto:x@y", "ws://x")).is_err());
        assert!(RestClient::new(&Config::new("::", "ws://x")).is_err());
    }

    #[test]
    fn test_loader_takes_depth_from_config() {
        let config = Config::new("http://localhost", "ws://localhost").with_depth(25);
        let loader = SnapshotLoader::new(&config).unwrap();
        assert_eq!(loader.depth(), 25);
    }
}
