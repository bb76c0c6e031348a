//! Typed configuration for bulwark pipelines.
//!
//! This crate provides a strongly-typed configuration with support for:
//! - TOML and JSON configuration files
//! - `.env` files and environment variable overrides
//! - Strict validation (fails on unknown fields and duplicate stages)
//! - Layered configuration (defaults → file → env)
//!
//! # Overview
//!
//! [`BulwarkConfig`] holds every section:
//!
//! - [`ServiceConfig`] - service name attached to log events
//! - [`RateLimitSection`] - quota, window, key prefix, on/off
//! - [`PipelineSection`] - which stages run, outermost first
//! - [`StoreSection`] - shared counter store URL
//! - [`TelemetrySection`] - logging and metrics exporter
//!
//! # Example
//!
//! ```no_run
//! use bulwark_config::ConfigLoader;
//!
//! # fn main() -> Result<(), bulwark_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_file("bulwark.toml")?
//!     .with_env_prefix("BULWARK")
//!     .load()?;
//!
//! println!("{} requests per window", config.rate_limit.requests_per_window);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [service]
//! name = "orders"
//!
//! [rate_limit]
//! enabled = true
//! requests_per_window = 10
//! window_ms = 1000
//! key_prefix = "rate_limit:"
//!
//! [pipeline]
//! stages = ["security_headers", "trace", "recover", "logger", "metrics", "rate_limit"]
//!
//! [store]
//! url = "redis://127.0.0.1:6379"
//!
//! [telemetry.logging]
//! enabled = true
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```
//!
//! # Environment Variable Overrides
//!
//! All configuration values can be overridden via environment variables using
//! the format `PREFIX__SECTION__KEY`. For example:
//!
//! - `BULWARK__RATE_LIMIT__REQUESTS_PER_WINDOW=100`
//! - `BULWARK__PIPELINE__STAGES=trace,logger,rate_limit`
//! - `BULWARK__TELEMETRY__METRICS__ENABLED=false`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{BulwarkConfig, BulwarkConfigBuilder};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    LogFormat, LoggingSection, MetricsSection, PipelineSection, RateLimitSection, ServiceConfig,
    StageKind, StoreSection, TelemetrySection,
};
