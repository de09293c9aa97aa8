//! CoinGecko markets client
//!
//! Issues one GET per poll against the `/coins/markets` endpoint and decodes
//! the batch into [`Coin`] records. HTTP 429 is surfaced as its own error
//! variant so the scheduler can enter backoff; every other failure is
//! absorbed upstream by falling back to the persisted snapshot.

use super::{Coin, MarketsSource};
use crate::config::ApiConfig;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Errors from the markets fetch path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The configured base URL or query could not form a valid request
    #[error("invalid request URL")]
    InvalidRequest,
    /// Transport-level failure or a non-HTTP response
    #[error("invalid response from server")]
    InvalidResponse,
    /// The body did not match the expected markets schema
    #[error("failed to decode markets response")]
    Decode,
    /// HTTP 429 from the API
    #[error("rate limit exceeded")]
    RateLimited,
    /// Any other non-2xx status
    #[error("server error: {status}")]
    Server { status: u16 },
}

/// Configuration for the CoinGecko client
#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Quote currency for prices
    pub vs_currency: String,
    /// Markets per page (only the first page is fetched)
    pub per_page: u32,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: COINGECKO_API_URL.to_string(),
            timeout: Duration::from_secs(10),
            vs_currency: "usd".to_string(),
            per_page: 30,
        }
    }
}

impl From<&ApiConfig> for CoinGeckoConfig {
    fn from(config: &ApiConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            vs_currency: config.vs_currency.clone(),
            per_page: config.per_page,
        }
    }
}

/// Client for the CoinGecko markets endpoint
pub struct CoinGeckoClient {
    config: CoinGeckoConfig,
    client: Client,
}

impl CoinGeckoClient {
    /// Create a new client with default configuration
    pub fn new() -> Self {
        Self::with_config(CoinGeckoConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: CoinGeckoConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Fetch the top markets ordered by market cap
    pub async fn fetch_coins(&self) -> Result<Vec<Coin>, FetchError> {
        let url = Url::parse(&format!("{}/coins/markets", self.config.base_url))
            .map_err(|_| FetchError::InvalidRequest)?;

        tracing::debug!(url = %url, "Fetching markets from CoinGecko");

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .query(&[
                ("vs_currency", self.config.vs_currency.as_str()),
                ("order", "market_cap_desc"),
                ("per_page", &self.config.per_page.to_string()),
                ("page", "1"),
                ("sparkline", "false"),
                ("price_change_percentage", "24h"),
            ])
            .send()
            .await
            .map_err(|_| FetchError::InvalidResponse)?;

        if let Some(err) = classify_status(response.status()) {
            return Err(err);
        }

        let markets: Vec<MarketsEntry> =
            response.json().await.map_err(|_| FetchError::Decode)?;

        tracing::debug!(count = markets.len(), "Decoded markets batch");

        Ok(markets.into_iter().map(MarketsEntry::into_coin).collect())
    }
}

impl Default for CoinGeckoClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketsSource for CoinGeckoClient {
    async fn fetch_markets(&self) -> Result<Vec<Coin>, FetchError> {
        self.fetch_coins().await
    }
}

/// Map a response status to the fetch error taxonomy, `None` for 200
fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Some(FetchError::RateLimited);
    }
    if status != StatusCode::OK {
        return Some(FetchError::Server {
            status: status.as_u16(),
        });
    }
    None
}

/// Raw entry from the markets endpoint
#[derive(Debug, Deserialize)]
struct MarketsEntry {
    id: String,
    symbol: String,
    name: String,
    image: String,
    current_price: f64,
    price_change_percentage_24h: Option<f64>,
}

impl MarketsEntry {
    fn into_coin(self) -> Coin {
        Coin {
            id: self.id,
            symbol: self.symbol,
            name: self.name,
            image: self.image,
            current_price: self.current_price,
            price_change_24h: self.price_change_percentage_24h,
            last_updated: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = CoinGeckoClient::new();
        assert_eq!(client.config.base_url, COINGECKO_API_URL);
    }

    #[test]
    fn test_config_default() {
        let config = CoinGeckoConfig::default();
        assert_eq!(config.base_url, COINGECKO_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.vs_currency, "usd");
        assert_eq!(config.per_page, 30);
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(StatusCode::OK).is_none());
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Some(FetchError::RateLimited)
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Some(FetchError::Server { status: 500 })
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND),
            Some(FetchError::Server { status: 404 })
        ));
    }

    #[test]
    fn test_decode_markets_entry() {
        let json = r#"[
            {
                "id": "bitcoin",
                "symbol": "btc",
                "name": "Bitcoin",
                "image": "https://assets.coingecko.com/coins/images/1/large/bitcoin.png",
                "current_price": 64000.12,
                "price_change_percentage_24h": 2.41,
                "market_cap": 1260000000000
            },
            {
                "id": "tether",
                "symbol": "usdt",
                "name": "Tether",
                "image": "https://assets.coingecko.com/coins/images/325/large/tether.png",
                "current_price": 1.0,
                "price_change_percentage_24h": null
            }
        ]"#;

        let entries: Vec<MarketsEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "bitcoin");
        assert_eq!(entries[0].price_change_percentage_24h, Some(2.41));

        let coins: Vec<Coin> = entries.into_iter().map(MarketsEntry::into_coin).collect();
        assert_eq!(coins[0].symbol, "btc");
        assert_eq!(coins[0].current_price, 64000.12);
        assert_eq!(coins[1].price_change_24h, None);
    }

    #[test]
    fn test_decode_markets_entry_missing_field() {
        let json = r#"[{"id": "bitcoin", "symbol": "btc"}]"#;
        let result: Result<Vec<MarketsEntry>, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_from_api_config() {
        let api = crate::config::ApiConfig {
            base_url: "https://example.test/api".to_string(),
            vs_currency: "eur".to_string(),
            per_page: 10,
            timeout_secs: 5,
            rate_limit_retry_secs: 60,
        };

        let config = CoinGeckoConfig::from(&api);
        assert_eq!(config.base_url, "https://example.test/api");
        assert_eq!(config.vs_currency, "eur");
        assert_eq!(config.per_page, 10);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
