//! Prometheus metrics

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint and register metric descriptions.
///
/// Must be called from within a tokio runtime.
pub fn serve_metrics(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;

    metrics::describe_counter!("coinwatch_polls_total", "Sync cycles attempted");
    metrics::describe_counter!(
        "coinwatch_coins_updated",
        "Coins that changed beyond tolerance"
    );
    metrics::describe_counter!(
        "coinwatch_rate_limited_total",
        "Polls rejected by the API with HTTP 429"
    );
    metrics::describe_gauge!("coinwatch_tracked_coins", "Coins known to the view cache");

    tracing::info!(port, "Metrics endpoint listening");
    Ok(())
}
