use clap::Parser;
use coinwatch::cli::{Cli, Commands};
use coinwatch::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        toml::from_str(include_str!("../config.toml.example")).expect("Invalid default config")
    });

    // Initialize telemetry
    coinwatch::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Watch(args) => {
            tracing::info!("Starting market watch");
            args.execute(&config).await?;
        }
        Commands::List(args) => {
            args.execute(&config).await?;
        }
        Commands::History(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  API: {} ({})", config.api.base_url, config.api.vs_currency);
            println!("  Store: {}", config.store.db_path.display());
            println!(
                "  Refresh: every {}s, tolerance {}",
                config.refresh.interval_secs, config.store.price_tolerance
            );
            println!(
                "  Retention: {}h, asset cache {}",
                config.store.history_retention_hours, config.assets.cache_size
            );
        }
    }

    Ok(())
}
