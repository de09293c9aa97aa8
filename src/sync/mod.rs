//! Synchronization engine
//!
//! Ties the poll loop together: the scheduler fires on a fixed period, the
//! engine fetches one batch and reconciles it into the store and the view
//! cache, and a rate-limit signal from the API flips the scheduler into a
//! deadline-based backoff with a one-second countdown.

mod engine;
mod scheduler;
mod service;

pub use engine::{SyncEngine, SyncOutcome};
pub use scheduler::{RateLimitStatus, Scheduler};
pub use service::MarketWatch;
