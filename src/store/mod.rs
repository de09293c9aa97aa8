//! Persistent snapshot store
//!
//! Durable home for the coin table and the append-only price history.
//! Upserts are change-aware: writing the same batch twice costs no disk
//! writes beyond the lookup. Retention is enforced on history only.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::market::{Coin, PricePoint};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Trait for snapshot store implementations
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Insert or update a batch of coins, applying tolerance-based change
    /// detection per coin. Returns the ids that were actually written.
    /// A failure on one coin must not abort the rest of the batch.
    async fn upsert_coins(&self, coins: &[Coin]) -> anyhow::Result<Vec<String>>;

    /// Append one history observation
    async fn append_history(&self, point: &PricePoint) -> anyhow::Result<()>;

    /// Delete history observations older than the cutoff, returning the
    /// number of rows removed
    async fn prune_history(&self, cutoff: DateTime<Utc>) -> anyhow::Result<usize>;

    /// History for one coin within `[now - window, now]`, ascending by
    /// observation time
    async fn history(&self, coin_id: &str, window: Duration) -> anyhow::Result<Vec<PricePoint>>;

    /// Look up a single coin by id
    async fn get_coin(&self, coin_id: &str) -> anyhow::Result<Option<Coin>>;

    /// All known coins ordered by current price descending (id breaks ties)
    async fn list_all(&self) -> anyhow::Result<Vec<Coin>>;
}
