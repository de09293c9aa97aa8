//! List command implementation

use crate::config::Config;
use crate::store::{PriceStore, SqliteStore};
use clap::Args;

#[derive(Args, Debug)]
pub struct ListArgs {}

impl ListArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = SqliteStore::open(&config.store.db_path, config.store.price_tolerance)?;
        let coins = store.list_all().await?;

        if coins.is_empty() {
            println!("No persisted snapshot yet. Run `coinwatch watch` first.");
            return Ok(());
        }

        println!("{:<12} {:<24} {:>14} {:>8}", "SYMBOL", "NAME", "PRICE", "24H");
        for coin in coins {
            let change = coin
                .price_change_24h
                .map(|c| format!("{c:+.2}%"))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "{:<12} {:<24} {:>14.4} {:>8}",
                coin.symbol.to_uppercase(),
                coin.name,
                coin.current_price,
                change
            );
        }

        Ok(())
    }
}
