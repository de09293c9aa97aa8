//! coinwatch: polling price tracker for CoinGecko markets
//!
//! This library provides the core components for:
//! - Periodic market snapshots via the CoinGecko markets endpoint
//! - Tolerance-gated change detection and reconciliation
//! - A SQLite snapshot store with a 24-hour price history window
//! - An identity-preserving view cache for downstream observers
//! - Rate-limit backoff with a one-second countdown
//! - A bounded cache for remote assets (coin thumbnails)
//! - Full observability stack

pub mod cache;
pub mod cli;
pub mod config;
pub mod market;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod view;
