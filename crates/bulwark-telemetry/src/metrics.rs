//! Prometheus metrics for bulwark.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `http_request_duration_seconds` | Histogram | `path`, `method` | Request latency |
//! | `http_requests_total` | Counter | `path`, `method`, `status` | Completed requests |
//! | `rate_limit_rejections_total` | Counter | - | Requests rejected with 429 |
//! | `rate_limit_store_failures_total` | Counter | `operation` | Counter store calls that failed |
//! | `panics_recovered_total` | Counter | - | Faults intercepted by panic isolation |
//!
//! Recording functions are safe to call before [`init_metrics`]; without an
//! installed recorder the `metrics` facade drops the samples.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Request duration histogram name.
pub const REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Request counter name.
pub const REQUESTS_TOTAL: &str = "http_requests_total";

/// Rate-limit rejection counter name.
pub const RATE_LIMIT_REJECTIONS_TOTAL: &str = "rate_limit_rejections_total";

/// Counter store failure counter name.
pub const RATE_LIMIT_STORE_FAILURES_TOTAL: &str = "rate_limit_store_failures_total";

/// Recovered panic counter name.
pub const PANICS_RECOVERED_TOTAL: &str = "panics_recovered_total";

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address to expose the scrape endpoint on (e.g., "0.0.0.0:9090").
    pub addr: String,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: "0.0.0.0:9090".to_string(),
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder and its HTTP scrape listener.
///
/// Inside a Tokio runtime the exporter is spawned onto it; otherwise the
/// exporter gets a background thread of its own.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .with_http_listener(addr)
        .install()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    register_metric_descriptions();

    Ok(())
}

fn register_metric_descriptions() {
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests processed");
    describe_counter!(
        RATE_LIMIT_REJECTIONS_TOTAL,
        "Requests rejected because the client exceeded its quota"
    );
    describe_counter!(
        RATE_LIMIT_STORE_FAILURES_TOTAL,
        "Counter store operations that failed"
    );
    describe_counter!(
        PANICS_RECOVERED_TOTAL,
        "Faults intercepted by the panic isolation stage"
    );
}

/// Records a completed request.
///
/// Observes the duration keyed by `{path, method}` and increments the
/// request counter keyed by `{path, method, status}`.
pub fn record_request(path: &str, method: &str, status_code: u16, duration: Duration) {
    histogram!(
        REQUEST_DURATION_SECONDS,
        "path" => path.to_string(),
        "method" => method.to_string()
    )
    .record(duration.as_secs_f64());

    counter!(
        REQUESTS_TOTAL,
        "path" => path.to_string(),
        "method" => method.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);
}

/// Records a request rejected by the rate limiter.
pub fn record_rate_limited() {
    counter!(RATE_LIMIT_REJECTIONS_TOTAL).increment(1);
}

/// Records a failed counter store call (`"increment"` or `"expire"`).
pub fn record_store_failure(operation: &'static str) {
    counter!(RATE_LIMIT_STORE_FAILURES_TOTAL, "operation" => operation).increment(1);
}

/// Records a panic intercepted by the isolation stage.
pub fn record_panic_recovered() {
    counter!(PANICS_RECOVERED_TOTAL).increment(1);
}
