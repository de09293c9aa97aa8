//! Configuration types for coinwatch

use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
}

/// Remote markets endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL for the CoinGecko API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Quote currency for prices
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,

    /// Number of markets per page (single page is fetched)
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Backoff window after an HTTP 429, in seconds
    #[serde(default = "default_retry_secs")]
    pub rate_limit_retry_secs: u64,
}

/// Snapshot store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,

    /// Absolute tolerance below which a price move is treated as unchanged
    #[serde(default = "default_price_tolerance")]
    pub price_tolerance: f64,

    /// History retention window in hours
    #[serde(default = "default_retention_hours")]
    pub history_retention_hours: i64,
}

/// Polling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between polls of the markets endpoint
    #[serde(default = "default_refresh_secs")]
    pub interval_secs: u64,
}

/// Asset (thumbnail) cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Maximum number of cached assets before eviction kicks in
    #[serde(default = "default_asset_cache_size")]
    pub cache_size: usize,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    pub metrics_port: u16,
    pub log_level: String,
}

fn default_base_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}
fn default_vs_currency() -> String {
    "usd".to_string()
}
fn default_per_page() -> u32 {
    30
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_retry_secs() -> u64 {
    60
}
fn default_price_tolerance() -> f64 {
    crate::market::DEFAULT_PRICE_TOLERANCE
}
fn default_retention_hours() -> i64 {
    24
}
fn default_refresh_secs() -> u64 {
    12
}
fn default_asset_cache_size() -> usize {
    100
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_secs(),
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            cache_size: default_asset_cache_size(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
