//! Observability for the bulwark middleware pipeline.
//!
//! This crate wires the process-wide sinks the pipeline stages report into:
//!
//! - **Logging**: structured JSON (or pretty) lines via `tracing-subscriber`
//! - **Metrics**: Prometheus-format metrics via the `metrics` crate
//!
//! Stages never depend on a particular subscriber or recorder. They emit
//! `tracing` events and call the recording helpers in [`metrics`]; whatever
//! was installed by [`init_telemetry`] (or nothing, in tests) receives them.
//!
//! # Example
//!
//! ```rust,ignore
//! use bulwark_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::builder()
//!         .service_name("orders")
//!         .metrics_addr("0.0.0.0:9090")
//!         .build();
//!
//!     init_telemetry(&config).expect("telemetry");
//! }
//! ```
//!
//! # Metrics Endpoint
//!
//! ```text
//! # TYPE http_requests_total counter
//! http_requests_total{path="/orders",method="GET",status="200"} 1234
//! http_requests_total{path="/orders",method="GET",status="429"} 56
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    tracing::info!(
        service = %config.service_name,
        metrics = config.metrics.enabled,
        "telemetry initialised"
    );
    Ok(())
}
