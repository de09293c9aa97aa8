//! CLI interface for coinwatch
//!
//! Provides subcommands for:
//! - `watch`: Poll the markets endpoint and stream updates
//! - `list`: Print the persisted snapshot
//! - `history`: Print the price history for one coin
//! - `config`: Show the effective configuration

mod history;
mod list;
mod watch;

pub use history::HistoryArgs;
pub use list::ListArgs;
pub use watch::WatchArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "coinwatch")]
#[command(about = "Polling price tracker that mirrors CoinGecko markets into a local snapshot")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the markets endpoint and stream updates
    Watch(WatchArgs),
    /// Print the persisted snapshot
    List(ListArgs),
    /// Print the price history for one coin
    History(HistoryArgs),
    /// Show the effective configuration
    Config,
}
