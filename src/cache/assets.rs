//! Remote asset fetcher backed by the bounded cache
//!
//! Fetches coin thumbnails at most once per URL; repeat requests are served
//! from memory until the entry is evicted.

use super::BoundedCache;
use anyhow::Context;
use reqwest::Client;
use std::time::Duration;

/// Fetches and caches small remote assets (thumbnails)
pub struct AssetFetcher {
    client: Client,
    cache: BoundedCache<Vec<u8>>,
}

impl AssetFetcher {
    /// Create a fetcher with the given cache capacity
    pub fn new(cache_size: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            cache: BoundedCache::new(cache_size),
        }
    }

    /// Fetch the asset at `url`, serving from cache when possible
    pub async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        if let Some(bytes) = self.cache.get(url) {
            tracing::trace!(url, "Asset cache hit");
            return Ok(bytes);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch asset {url}"))?
            .error_for_status()
            .with_context(|| format!("Asset request rejected for {url}"))?;

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read asset body for {url}"))?
            .to_vec();

        self.cache.insert(url, bytes.clone());
        Ok(bytes)
    }

    /// Drop all cached assets
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Number of cached assets
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_starts_empty() {
        let fetcher = AssetFetcher::new(10);
        assert_eq!(fetcher.cached(), 0);
    }

    #[tokio::test]
    async fn test_fetch_invalid_url_errors() {
        let fetcher = AssetFetcher::new(10);
        let result = fetcher.fetch("not a url").await;
        assert!(result.is_err());
        assert_eq!(fetcher.cached(), 0);
    }
}
