//! Watch command implementation

use crate::cache::AssetFetcher;
use crate::config::Config;
use crate::sync::MarketWatch;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Only show coins whose symbol or name contains this text
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Number of coins to print per update
    #[arg(short, long, default_value_t = 10)]
    pub top: usize,
}

impl WatchArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        crate::telemetry::serve_metrics(config.telemetry.metrics_port)?;

        let watch = MarketWatch::from_config(config)?;
        watch.fetch_initial_data().await;

        if watch.handles().is_empty() {
            tracing::warn!("No market data available yet, waiting for the next poll");
        } else {
            self.print_snapshot(&watch);
        }

        // Warm the thumbnail cache in the background; misses are logged only
        let assets = Arc::new(AssetFetcher::new(config.assets.cache_size));
        let thumbs: Vec<String> = watch.handles().iter().map(|h| h.image.clone()).collect();
        let prefetch = assets.clone();
        tokio::spawn(async move {
            for url in thumbs {
                if let Err(e) = prefetch.fetch(&url).await {
                    tracing::debug!(url, error = %e, "Thumbnail prefetch failed");
                }
            }
        });

        let mut updates = watch.updates();
        let mut rate_limit = watch.rate_limit_watch();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutting down");
                    watch.pause_updates();
                    break;
                }
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.print_snapshot(&watch);
                }
                changed = rate_limit.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = rate_limit.borrow_and_update().clone();
                    if let Some(status) = status {
                        if status.seconds_remaining % 10 == 0 {
                            tracing::warn!(
                                seconds_remaining = status.seconds_remaining,
                                "{}", status.message
                            );
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn print_snapshot(&self, watch: &MarketWatch) {
        let handles = match &self.filter {
            Some(query) => watch.filtered(query),
            None => watch.handles(),
        };

        for handle in handles.iter().take(self.top) {
            let state = handle.state();
            let change = state
                .change_24h
                .map(|c| format!("{c:+.2}%"))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "{:<12} {:>14.4} {:>8}  rev {}",
                handle.symbol.to_uppercase(),
                state.price,
                change,
                state.revision
            );
            handle.mark_revealed();
        }
        println!();
    }
}
