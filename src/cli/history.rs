//! History command implementation

use crate::config::Config;
use crate::store::{PriceStore, SqliteStore};
use clap::Args;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Coin identifier, e.g. "bitcoin"
    pub id: String,

    /// Trailing window in hours
    #[arg(long, default_value_t = 24)]
    pub hours: i64,
}

impl HistoryArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = SqliteStore::open(&config.store.db_path, config.store.price_tolerance)?;
        let points = store
            .history(&self.id, chrono::Duration::hours(self.hours))
            .await?;

        if points.is_empty() {
            println!("No history for '{}' in the last {}h.", self.id, self.hours);
            return Ok(());
        }

        for point in points {
            let change = point
                .change_24h
                .map(|c| format!("{c:+.2}%"))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "{}  {:>14.4} {:>8}",
                point.timestamp.format("%Y-%m-%d %H:%M:%S"),
                point.price,
                change
            );
        }

        Ok(())
    }
}
