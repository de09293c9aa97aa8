//! Telemetry module
//!
//! Structured logging plus a Prometheus metrics endpoint

mod logging;
mod metrics;

pub use logging::init_logging;
pub use metrics::serve_metrics;

use crate::config::TelemetryConfig;

/// Initialize logging from configuration.
///
/// The metrics endpoint is started separately by long-running commands via
/// [`serve_metrics`]; one-shot commands skip it so they do not bind a port.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&config.log_level)
}
