//! Collaborator-facing service
//!
//! `MarketWatch` wires the fetcher, store, view cache, and scheduler
//! together and exposes the surface consumers care about: initial load,
//! lookups, history windows, pause/resume, and the observable rate-limit
//! status.

use super::engine::{SyncEngine, SyncOutcome};
use super::scheduler::{RateLimitStatus, Scheduler};
use crate::config::Config;
use crate::market::{Coin, CoinGeckoClient, CoinGeckoConfig, MarketsSource, PricePoint};
use crate::store::{PriceStore, SqliteStore};
use crate::view::{CoinHandle, ViewCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Facade over the sync pipeline
pub struct MarketWatch {
    store: Arc<dyn PriceStore>,
    view: Arc<ViewCache>,
    engine: Arc<SyncEngine>,
    scheduler: Scheduler,
}

impl MarketWatch {
    /// Build the full pipeline from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let source = Arc::new(CoinGeckoClient::with_config(CoinGeckoConfig::from(
            &config.api,
        )));
        let store = Arc::new(SqliteStore::open(
            &config.store.db_path,
            config.store.price_tolerance,
        )?);

        Ok(Self::new(
            source,
            store,
            config.store.price_tolerance,
            config.store.history_retention_hours,
            Duration::from_secs(config.refresh.interval_secs),
            Duration::from_secs(config.api.rate_limit_retry_secs),
        ))
    }

    /// Assemble the pipeline from explicit collaborators
    pub fn new(
        source: Arc<dyn MarketsSource>,
        store: Arc<dyn PriceStore>,
        tolerance: f64,
        retention_hours: i64,
        poll_interval: Duration,
        retry_window: Duration,
    ) -> Self {
        let view = Arc::new(ViewCache::new(tolerance));
        let engine = Arc::new(SyncEngine::new(
            source,
            store.clone(),
            view.clone(),
            retention_hours,
        ));
        let scheduler = Scheduler::new(engine.clone(), poll_interval, retry_window);

        Self {
            store,
            view,
            engine,
            scheduler,
        }
    }

    /// Load the persisted snapshot, run the first sync, and start polling.
    ///
    /// Polling also starts after a failed first fetch as long as cached
    /// data exists, so the view keeps refreshing once the API recovers.
    /// Calling this twice is a no-op.
    pub async fn fetch_initial_data(&self) {
        if !self.view.is_empty() {
            return;
        }

        // Persisted snapshot first so consumers see data immediately
        self.engine.serve_cached().await;

        let outcome = self.scheduler.poll_now().await;
        match outcome {
            Some(SyncOutcome::Synced { .. }) => self.scheduler.start(),
            _ if !self.view.is_empty() => self.scheduler.start(),
            _ => {
                tracing::warn!("Initial fetch failed with no cached data, polling not started");
            }
        }
    }

    /// Last reconciled state for one coin, from the persistent store
    pub async fn coin(&self, id: &str) -> anyhow::Result<Option<Coin>> {
        self.store.get_coin(id).await
    }

    /// Price history for one coin over the trailing `hours`
    pub async fn history(&self, id: &str, hours: i64) -> anyhow::Result<Vec<PricePoint>> {
        self.store.history(id, chrono::Duration::hours(hours)).await
    }

    /// All coins from the persistent store, highest price first
    pub async fn list_all(&self) -> anyhow::Result<Vec<Coin>> {
        self.store.list_all().await
    }

    /// Stop periodic polling; in-flight work completes on its own
    pub fn pause_updates(&self) {
        self.scheduler.pause();
    }

    /// Restart periodic polling; a no-op when already running
    pub fn resume_updates(&self) {
        self.scheduler.resume();
    }

    /// Stable handles for every coin seen so far
    pub fn handles(&self) -> Vec<Arc<CoinHandle>> {
        self.view.handles()
    }

    /// Handles matching a case-insensitive substring of symbol or name
    pub fn filtered(&self, query: &str) -> Vec<Arc<CoinHandle>> {
        self.view.filtered(query)
    }

    /// Ticks once per batch that changed at least one handle
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.view.updates()
    }

    /// Current rate-limit status, if backoff is active
    pub fn rate_limit(&self) -> Option<RateLimitStatus> {
        self.scheduler.rate_limit()
    }

    /// Observable rate-limit status, updated each countdown second
    pub fn rate_limit_watch(&self) -> watch::Receiver<Option<RateLimitStatus>> {
        self.scheduler.rate_limit_watch()
    }
}
