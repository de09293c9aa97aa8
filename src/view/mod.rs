//! Identity-preserving view cache
//!
//! Observers hold `Arc<CoinHandle>` for the lifetime of the process. A
//! reconciliation mutates the handle's interior state and bumps its revision
//! counter instead of replacing the handle, so downstream code keyed on
//! identity never sees a structural change. Entries are created on first
//! sight and never removed, even when a coin drops out of a later fetch.

use crate::market::{self, Coin};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Snapshot of a handle's mutable state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandleState {
    /// Current price
    pub price: f64,
    /// 24-hour percentage change
    pub change_24h: Option<f64>,
    /// True while an update cycle is being applied
    pub updating: bool,
    /// True until the observer acknowledges the latest update
    pub pending_reveal: bool,
    /// Bumped once per completed update cycle
    pub revision: u64,
}

/// A stable, observable handle for one coin
///
/// Identity fields are fixed at creation; price state mutates in place.
pub struct CoinHandle {
    /// Stable identifier, never changes after creation
    pub id: String,
    /// Display ticker symbol
    pub symbol: String,
    /// Display name
    pub name: String,
    /// Thumbnail image URL
    pub image: String,
    state: RwLock<HandleState>,
}

impl CoinHandle {
    fn new(coin: &Coin) -> Self {
        Self {
            id: coin.id.clone(),
            symbol: coin.symbol.clone(),
            name: coin.name.clone(),
            image: coin.image.clone(),
            state: RwLock::new(HandleState {
                price: coin.current_price,
                change_24h: coin.price_change_24h,
                updating: false,
                pending_reveal: false,
                revision: 0,
            }),
        }
    }

    /// Read the current mutable state
    pub fn state(&self) -> HandleState {
        *self.state.read()
    }

    /// Current price
    pub fn price(&self) -> f64 {
        self.state.read().price
    }

    /// Current 24-hour percentage change
    pub fn change_24h(&self) -> Option<f64> {
        self.state.read().change_24h
    }

    /// Current revision counter
    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    /// Clear the transient update flags once the observer has shown the
    /// new values
    pub fn mark_revealed(&self) {
        let mut state = self.state.write();
        state.updating = false;
        state.pending_reveal = false;
    }

    /// Apply fresh values if they differ beyond the tolerance.
    ///
    /// Returns true when the handle was mutated. The revision is bumped
    /// exactly once per applied update.
    fn apply(&self, coin: &Coin, tolerance: f64) -> bool {
        let mut state = self.state.write();

        if !market::coin_changed(
            state.price,
            state.change_24h,
            coin.current_price,
            coin.price_change_24h,
            tolerance,
        ) {
            return false;
        }

        state.price = coin.current_price;
        state.change_24h = coin.price_change_24h;
        state.updating = true;
        state.pending_reveal = true;
        state.revision += 1;
        true
    }
}

struct CacheInner {
    /// Handles in first-seen order, mirroring fetch order for the initial batch
    handles: Vec<Arc<CoinHandle>>,
    index: HashMap<String, Arc<CoinHandle>>,
}

/// Keyed collection of long-lived coin handles
pub struct ViewCache {
    inner: RwLock<CacheInner>,
    tolerance: f64,
    generation: watch::Sender<u64>,
}

impl ViewCache {
    /// Create an empty cache with the given change tolerance
    pub fn new(tolerance: f64) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            inner: RwLock::new(CacheInner {
                handles: Vec::new(),
                index: HashMap::new(),
            }),
            tolerance,
            generation,
        }
    }

    /// Reconcile a batch of coins into the cache.
    ///
    /// Unknown ids get a new handle; known ids are mutated in place when
    /// changed beyond the tolerance. Emits a single batch notification when
    /// at least one handle changed. Returns the number of changed handles.
    pub fn upsert_batch(&self, coins: &[Coin]) -> usize {
        let mut changed = 0;

        {
            let mut inner = self.inner.write();
            for coin in coins {
                match inner.index.get(&coin.id) {
                    Some(handle) => {
                        if handle.apply(coin, self.tolerance) {
                            changed += 1;
                        }
                    }
                    None => {
                        let handle = Arc::new(CoinHandle::new(coin));
                        inner.index.insert(coin.id.clone(), handle.clone());
                        inner.handles.push(handle);
                        changed += 1;
                    }
                }
            }
        }

        // Coalesced: one notification per batch, none when nothing moved
        if changed > 0 {
            self.generation.send_modify(|g| *g += 1);
        }

        changed
    }

    /// Look up a handle by id
    pub fn get(&self, id: &str) -> Option<Arc<CoinHandle>> {
        self.inner.read().index.get(id).cloned()
    }

    /// All handles in first-seen order
    pub fn handles(&self) -> Vec<Arc<CoinHandle>> {
        self.inner.read().handles.clone()
    }

    /// Handles whose symbol or name contains the query, case-insensitively.
    ///
    /// Recomputed over the full set on every call; an empty query returns
    /// everything.
    pub fn filtered(&self, query: &str) -> Vec<Arc<CoinHandle>> {
        if query.is_empty() {
            return self.handles();
        }

        let needle = query.to_lowercase();
        self.inner
            .read()
            .handles
            .iter()
            .filter(|h| {
                h.symbol.to_lowercase().contains(&needle)
                    || h.name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// Number of known handles
    pub fn len(&self) -> usize {
        self.inner.read().handles.len()
    }

    /// True when no coin has been seen yet
    pub fn is_empty(&self) -> bool {
        self.inner.read().handles.is_empty()
    }

    /// Watch channel that ticks once per batch with at least one change
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}
