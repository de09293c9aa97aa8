//! Polling scheduler and rate-limit backoff
//!
//! A fixed-period timer drives the poll loop; each tick spawns one sync
//! cycle and does not wait for the previous one (writes downstream are
//! idempotent, so overlap is tolerated). A 429 from the API flips the
//! scheduler into backoff: polls short-circuit until the deadline passes,
//! while an independent one-second ticker publishes the remaining time.
//! `pause` stops future ticks without cancelling an in-flight cycle.

use super::engine::{SyncEngine, SyncOutcome};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// User-visible rate-limit state, present only while backoff is active
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitStatus {
    /// Human-readable status line
    pub message: String,
    /// Fixed deadline at which polling resumes
    pub retry_at: DateTime<Utc>,
    /// Whole seconds until the deadline, recomputed each second
    pub seconds_remaining: i64,
}

/// Backoff state shared between the poll loop and the countdown ticker
struct Backoff {
    status: RwLock<Option<RateLimitStatus>>,
    deadline: RwLock<Option<Instant>>,
    tx: watch::Sender<Option<RateLimitStatus>>,
    countdown: Mutex<Option<JoinHandle<()>>>,
    retry_window: Duration,
}

impl Backoff {
    fn new(retry_window: Duration) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            status: RwLock::new(None),
            deadline: RwLock::new(None),
            tx,
            countdown: Mutex::new(None),
            retry_window,
        }
    }

    /// True while the deadline is in the future. A deadline that has
    /// passed is cleared on sight in case the countdown lagged.
    fn is_active(&self) -> bool {
        let deadline = *self.deadline.read();
        match deadline {
            Some(deadline) if Instant::now() < deadline => true,
            Some(_) => {
                self.clear();
                false
            }
            None => false,
        }
    }

    /// Enter (or re-enter) backoff. Re-entry replaces the deadline rather
    /// than stacking, and restarts the countdown.
    fn enter(self: &Arc<Self>) {
        let deadline = Instant::now() + self.retry_window;
        let retry_at = Utc::now()
            + chrono::Duration::from_std(self.retry_window).unwrap_or(chrono::Duration::zero());
        let seconds = self.retry_window.as_secs() as i64;

        let status = RateLimitStatus {
            message: format!("Rate limit reached. Resuming in {seconds}s"),
            retry_at,
            seconds_remaining: seconds,
        };

        *self.deadline.write() = Some(deadline);
        *self.status.write() = Some(status.clone());
        let _ = self.tx.send(Some(status));

        tracing::info!(seconds, "Entering rate-limit backoff");

        let mut countdown = self.countdown.lock();
        if let Some(handle) = countdown.take() {
            handle.abort();
        }
        let backoff = self.clone();
        *countdown = Some(tokio::spawn(async move {
            backoff.run_countdown(deadline, retry_at).await;
        }));
    }

    /// One-second ticker that recomputes the remaining time until it
    /// reaches zero, then clears the backoff state and stops.
    async fn run_countdown(&self, deadline: Instant, retry_at: DateTime<Utc>) {
        let mut ticker = time::interval(Duration::from_secs(1));
        ticker.tick().await; // immediate first tick

        loop {
            ticker.tick().await;
            let remaining = deadline.saturating_duration_since(Instant::now()).as_secs() as i64;

            if remaining <= 0 {
                self.clear();
                tracing::info!("Rate-limit backoff elapsed, polling resumes");
                return;
            }

            let status = RateLimitStatus {
                message: format!("Rate limit reached. Resuming in {remaining}s"),
                retry_at,
                seconds_remaining: remaining,
            };
            *self.status.write() = Some(status.clone());
            let _ = self.tx.send(Some(status));
        }
    }

    fn clear(&self) {
        *self.status.write() = None;
        *self.deadline.write() = None;
        let _ = self.tx.send(None);
    }
}

/// Drives periodic sync cycles with pause/resume and backoff
pub struct Scheduler {
    engine: Arc<SyncEngine>,
    interval: Duration,
    backoff: Arc<Backoff>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler polling at `interval`, backing off for
    /// `retry_window` after a rate limit
    pub fn new(engine: Arc<SyncEngine>, interval: Duration, retry_window: Duration) -> Self {
        Self {
            engine,
            interval,
            backoff: Arc::new(Backoff::new(retry_window)),
            poll_task: Mutex::new(None),
        }
    }

    /// Run one poll immediately, respecting backoff.
    ///
    /// Returns `None` when the poll was short-circuited by an active
    /// backoff deadline.
    pub async fn poll_now(&self) -> Option<SyncOutcome> {
        poll_tick(&self.engine, &self.backoff).await
    }

    /// Begin periodic polling. No-op when the timer is already running.
    pub fn start(&self) {
        let mut task = self.poll_task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        tracing::info!(interval_secs = self.interval.as_secs(), "Starting poll timer");

        let engine = self.engine.clone();
        let backoff = self.backoff.clone();
        let period = self.interval;

        *task = Some(tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.tick().await; // the first fetch is driven by the caller

            loop {
                ticker.tick().await;
                // Each tick spawns its own cycle; a slow poll never delays
                // the next tick
                let engine = engine.clone();
                let backoff = backoff.clone();
                tokio::spawn(async move {
                    poll_tick(&engine, &backoff).await;
                });
            }
        }));
    }

    /// Stop future ticks. An in-flight cycle is not cancelled; the
    /// countdown ticker, if any, keeps running.
    pub fn pause(&self) {
        if let Some(handle) = self.poll_task.lock().take() {
            handle.abort();
            tracing::info!("Poll timer paused");
        }
    }

    /// Restart the timer if it is not running; otherwise a no-op
    pub fn resume(&self) {
        self.start();
    }

    /// True while the poll timer is active
    pub fn is_running(&self) -> bool {
        self.poll_task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Current rate-limit status, `None` while polling is active
    pub fn rate_limit(&self) -> Option<RateLimitStatus> {
        self.backoff.status.read().clone()
    }

    /// Watch channel carrying the rate-limit status as it counts down
    pub fn rate_limit_watch(&self) -> watch::Receiver<Option<RateLimitStatus>> {
        self.backoff.tx.subscribe()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.poll_task.lock().take() {
            handle.abort();
        }
        if let Some(handle) = self.backoff.countdown.lock().take() {
            handle.abort();
        }
    }
}

/// One scheduled poll: short-circuit under backoff, otherwise run a sync
/// cycle and enter backoff on a rate-limit outcome
async fn poll_tick(engine: &SyncEngine, backoff: &Arc<Backoff>) -> Option<SyncOutcome> {
    if backoff.is_active() {
        tracing::debug!("Skipping poll, rate-limit backoff active");
        return None;
    }

    let outcome = engine.sync_once().await;
    if outcome == SyncOutcome::RateLimited {
        backoff.enter();
    }
    Some(outcome)
}
