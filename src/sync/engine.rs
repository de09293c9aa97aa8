//! Batch reconciliation
//!
//! One sync cycle: fetch a batch, upsert the changed coins into the store,
//! append a history point per changed coin, prune history past the retention
//! window (every successful cycle, even when nothing changed), then
//! reconcile the batch into the view cache. On any fetch
//! failure the engine serves the last persisted snapshot into the view
//! instead, without re-writing the store or re-appending history.

use crate::market::{Coin, FetchError, MarketsSource};
use crate::store::PriceStore;
use crate::view::ViewCache;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Result of one sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A fresh batch was fetched and reconciled
    Synced {
        /// Handles that actually changed this cycle
        changed: usize,
    },
    /// Fetch failed; the persisted snapshot was served instead
    ServedCached,
    /// The API rate-limited us; the persisted snapshot was served and the
    /// scheduler must enter backoff
    RateLimited,
}

/// Coordinates fetcher, store, and view cache for one poll cycle.
///
/// Owns no durable state of its own; all writes are idempotent and
/// tolerance-gated, so overlapping cycles are harmless.
pub struct SyncEngine {
    source: Arc<dyn MarketsSource>,
    store: Arc<dyn PriceStore>,
    view: Arc<ViewCache>,
    retention: Duration,
}

impl SyncEngine {
    /// Create an engine over the given collaborators
    pub fn new(
        source: Arc<dyn MarketsSource>,
        store: Arc<dyn PriceStore>,
        view: Arc<ViewCache>,
        retention_hours: i64,
    ) -> Self {
        Self {
            source,
            store,
            view,
            retention: Duration::hours(retention_hours),
        }
    }

    /// Run one sync cycle
    pub async fn sync_once(&self) -> SyncOutcome {
        metrics::counter!("coinwatch_polls_total").increment(1);

        match self.source.fetch_markets().await {
            Ok(batch) => {
                let changed = self.reconcile(&batch).await;
                tracing::debug!(batch = batch.len(), changed, "Sync cycle complete");
                SyncOutcome::Synced { changed }
            }
            Err(FetchError::RateLimited) => {
                metrics::counter!("coinwatch_rate_limited_total").increment(1);
                tracing::warn!("Markets API rate limited, serving cached snapshot");
                self.serve_cached().await;
                SyncOutcome::RateLimited
            }
            Err(e) => {
                tracing::warn!(error = %e, "Markets fetch failed, serving cached snapshot");
                self.serve_cached().await;
                SyncOutcome::ServedCached
            }
        }
    }

    /// Persist a fresh batch and reconcile it into the view
    async fn reconcile(&self, batch: &[Coin]) -> usize {
        let now = Utc::now();

        let changed_ids = match self.store.upsert_coins(batch).await {
            Ok(ids) => ids,
            Err(e) => {
                // The view still gets the fresh batch even if the store is sick
                tracing::error!(error = %e, "Snapshot upsert failed");
                Vec::new()
            }
        };

        for coin in batch.iter().filter(|c| changed_ids.contains(&c.id)) {
            if let Err(e) = self.store.append_history(&coin.price_point(now)).await {
                tracing::warn!(coin_id = %coin.id, error = %e, "Failed to append history");
            }
        }

        // Retention sweep runs on every successful cycle, changed or not
        if let Err(e) = self.store.prune_history(now - self.retention).await {
            tracing::warn!(error = %e, "History prune failed");
        }

        let changed = self.view.upsert_batch(batch);
        if changed > 0 {
            metrics::counter!("coinwatch_coins_updated").increment(changed as u64);
        }
        metrics::gauge!("coinwatch_tracked_coins").set(self.view.len() as f64);

        changed
    }

    /// Reconcile the last persisted snapshot into the view.
    ///
    /// Read-only: no upsert, no history, no prune.
    pub async fn serve_cached(&self) {
        match self.store.list_all().await {
            Ok(coins) if !coins.is_empty() => {
                let changed = self.view.upsert_batch(&coins);
                tracing::debug!(coins = coins.len(), changed, "Served persisted snapshot");
            }
            Ok(_) => {
                tracing::debug!("No persisted snapshot to serve");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read persisted snapshot");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Scripted markets source for engine tests
    struct ScriptedSource {
        batches: Mutex<Vec<Result<Vec<Coin>, FetchError>>>,
    }

    impl ScriptedSource {
        fn new(batches: Vec<Result<Vec<Coin>, FetchError>>) -> Self {
            Self {
                batches: Mutex::new(batches),
            }
        }
    }

    #[async_trait]
    impl MarketsSource for ScriptedSource {
        async fn fetch_markets(&self) -> Result<Vec<Coin>, FetchError> {
            let mut batches = self.batches.lock();
            if batches.is_empty() {
                return Err(FetchError::InvalidResponse);
            }
            batches.remove(0)
        }
    }

    fn coin(id: &str, price: f64, change: Option<f64>) -> Coin {
        Coin {
            id: id.to_string(),
            symbol: id[..3.min(id.len())].to_string(),
            name: id.to_string(),
            image: format!("https://example.com/{id}.png"),
            current_price: price,
            price_change_24h: change,
            last_updated: Utc::now(),
        }
    }

    fn engine_with(
        batches: Vec<Result<Vec<Coin>, FetchError>>,
    ) -> (SyncEngine, Arc<SqliteStore>, Arc<ViewCache>) {
        let store = Arc::new(SqliteStore::open_in_memory(0.001).unwrap());
        let view = Arc::new(ViewCache::new(0.001));
        let engine = SyncEngine::new(
            Arc::new(ScriptedSource::new(batches)),
            store.clone(),
            view.clone(),
            24,
        );
        (engine, store, view)
    }

    #[tokio::test]
    async fn test_fresh_batch_lands_in_store_and_view() {
        let (engine, store, view) =
            engine_with(vec![Ok(vec![coin("bitcoin", 100.0, Some(2.0))])]);

        let outcome = engine.sync_once().await;
        assert_eq!(outcome, SyncOutcome::Synced { changed: 1 });

        assert_eq!(
            store.get_coin("bitcoin").await.unwrap().unwrap().current_price,
            100.0
        );
        assert_eq!(view.get("bitcoin").unwrap().price(), 100.0);

        let history = store.history("bitcoin", Duration::hours(1)).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_within_tolerance_batch_appends_nothing() {
        let (engine, store, view) = engine_with(vec![
            Ok(vec![coin("btc", 100.0, Some(2.0))]),
            Ok(vec![coin("btc", 100.0005, Some(2.0))]),
        ]);

        engine.sync_once().await;
        let outcome = engine.sync_once().await;

        // Second batch is within tolerance: no handle change, no history point
        assert_eq!(outcome, SyncOutcome::Synced { changed: 0 });
        assert_eq!(view.get("btc").unwrap().revision(), 0);

        let history = store.history("btc", Duration::hours(1)).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_serves_persisted_snapshot() {
        let (engine, store, view) = engine_with(vec![
            Ok(vec![coin("btc", 100.0, Some(2.0))]),
            Err(FetchError::Decode),
        ]);

        engine.sync_once().await;
        let outcome = engine.sync_once().await;
        assert_eq!(outcome, SyncOutcome::ServedCached);

        // Persisted value still served, nothing re-appended
        assert_eq!(store.get_coin("btc").await.unwrap().unwrap().current_price, 100.0);
        assert_eq!(view.get("btc").unwrap().price(), 100.0);
        let history = store.history("btc", Duration::hours(1)).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_is_surfaced() {
        let (engine, _store, _view) = engine_with(vec![Err(FetchError::RateLimited)]);
        assert_eq!(engine.sync_once().await, SyncOutcome::RateLimited);
    }

    #[tokio::test]
    async fn test_failure_on_empty_store_is_quiet() {
        let (engine, _store, view) = engine_with(vec![Err(FetchError::InvalidResponse)]);
        assert_eq!(engine.sync_once().await, SyncOutcome::ServedCached);
        assert!(view.is_empty());
    }

    #[tokio::test]
    async fn test_old_history_pruned_on_unchanged_cycle() {
        // Batch matches the persisted price within tolerance, so the cycle
        // writes nothing; the retention sweep must still run
        let (engine, store, _view) = engine_with(vec![Ok(vec![coin("btc", 100.0, None)])]);

        store.upsert_coins(&[coin("btc", 100.0, None)]).await.unwrap();
        store
            .append_history(&crate::market::PricePoint {
                coin_id: "btc".to_string(),
                price: 100.0,
                change_24h: None,
                timestamp: Utc::now() - Duration::hours(25),
            })
            .await
            .unwrap();

        let outcome = engine.sync_once().await;
        assert_eq!(outcome, SyncOutcome::Synced { changed: 0 });

        let history = store.history("btc", Duration::hours(48)).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_old_history_pruned_on_changed_cycle() {
        let (engine, store, _view) = engine_with(vec![Ok(vec![coin("btc", 101.0, None)])]);

        // Seed the store with a stale point well past retention
        store.upsert_coins(&[coin("btc", 100.0, None)]).await.unwrap();
        store
            .append_history(&crate::market::PricePoint {
                coin_id: "btc".to_string(),
                price: 100.0,
                change_24h: None,
                timestamp: Utc::now() - Duration::hours(25),
            })
            .await
            .unwrap();

        engine.sync_once().await;

        let history = store.history("btc", Duration::hours(48)).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].price, 101.0);
    }
}
