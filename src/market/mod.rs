//! Market domain types and change detection
//!
//! `Coin` is the unit of synchronization: a price-bearing record identified
//! by a stable id. Change detection is tolerance-gated so that float noise
//! from the API does not count as an update.

mod coingecko;

pub use coingecko::{CoinGeckoClient, CoinGeckoConfig, FetchError, COINGECKO_API_URL};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default absolute tolerance for price and percentage comparisons
pub const DEFAULT_PRICE_TOLERANCE: f64 = 0.001;

/// A market record as tracked locally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coin {
    /// Stable identifier, immutable for the lifetime of the coin
    pub id: String,
    /// Display ticker symbol
    pub symbol: String,
    /// Display name
    pub name: String,
    /// Thumbnail image URL
    pub image: String,
    /// Most recently reconciled price
    pub current_price: f64,
    /// 24-hour percentage change, absent for thinly traded markets
    pub price_change_24h: Option<f64>,
    /// When this record was last reconciled
    pub last_updated: DateTime<Utc>,
}

/// A single price observation belonging to one coin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    /// Owning coin id
    pub coin_id: String,
    /// Observed price
    pub price: f64,
    /// 24-hour percentage change at observation time
    pub change_24h: Option<f64>,
    /// Observation timestamp
    pub timestamp: DateTime<Utc>,
}

impl Coin {
    /// Build the history point for this coin's current values
    pub fn price_point(&self, timestamp: DateTime<Utc>) -> PricePoint {
        PricePoint {
            coin_id: self.id.clone(),
            price: self.current_price,
            change_24h: self.price_change_24h,
            timestamp,
        }
    }
}

/// Trait for remote market sources
///
/// One call fetches one full batch; the error taxonomy distinguishes the
/// rate-limit outcome because it is the only one that changes scheduler state.
#[async_trait]
pub trait MarketsSource: Send + Sync {
    /// Fetch the current batch of markets
    async fn fetch_markets(&self) -> Result<Vec<Coin>, FetchError>;
}

/// True when two floats differ by more than the tolerance
pub fn value_changed(old: f64, new: f64, tolerance: f64) -> bool {
    (old - new).abs() > tolerance
}

/// Tolerance comparison for optional fields.
///
/// A presence mismatch counts as changed regardless of tolerance.
pub fn optional_changed(old: Option<f64>, new: Option<f64>, tolerance: f64) -> bool {
    match (old, new) {
        (Some(old), Some(new)) => value_changed(old, new, tolerance),
        (None, None) => false,
        _ => true,
    }
}

/// Whether a coin materially changed between two observations.
///
/// A coin is changed iff its price or its 24-hour percentage change moved
/// beyond the tolerance.
pub fn coin_changed(
    old_price: f64,
    old_change: Option<f64>,
    new_price: f64,
    new_change: Option<f64>,
    tolerance: f64,
) -> bool {
    value_changed(old_price, new_price, tolerance)
        || optional_changed(old_change, new_change, tolerance)
}
