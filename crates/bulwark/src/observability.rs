//! Telemetry settings from configuration.

use crate::error::BulwarkResult;
use bulwark_config::{BulwarkConfig, LogFormat};
use bulwark_telemetry::{LogConfig, MetricsConfig, TelemetryConfig};

/// Maps the configuration's telemetry section onto telemetry settings.
#[must_use]
pub fn telemetry_config(config: &BulwarkConfig) -> TelemetryConfig {
    let logging = &config.telemetry.logging;
    let metrics = &config.telemetry.metrics;

    TelemetryConfig::builder()
        .service_name(&config.service.name)
        .logging(LogConfig {
            enabled: logging.enabled,
            level: logging.level.clone(),
            json_format: logging.format == LogFormat::Json,
            ..LogConfig::default()
        })
        .metrics(MetricsConfig {
            enabled: metrics.enabled,
            addr: metrics.addr.clone(),
            ..MetricsConfig::default()
        })
        .build()
}

/// Installs the log subscriber and metrics exporter described by `config`.
///
/// Call once, early, from inside the Tokio runtime.
///
/// # Errors
///
/// Fails if a global subscriber or recorder is already installed, or the
/// metrics address cannot be bound.
pub fn init_telemetry(config: &BulwarkConfig) -> BulwarkResult<()> {
    bulwark_telemetry::init_telemetry(&telemetry_config(config))?;
    Ok(())
}
