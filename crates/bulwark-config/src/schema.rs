//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Service identity section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Service name attached to log events.
    #[serde(default = "default_service_name")]
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "bulwark-service".to_string()
}

/// Rate limiter section.
///
/// # Example
///
/// ```
/// use bulwark_config::RateLimitSection;
/// use std::time::Duration;
///
/// let section = RateLimitSection {
///     requests_per_window: 100,
///     window_ms: 60_000,
///     ..Default::default()
/// };
/// assert_eq!(section.window(), Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSection {
    /// Whether the limiter is active. A disabled limiter never touches the
    /// counter store.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests admitted per client per window.
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u64,

    /// Window length in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Prefix prepended to the client identity to form the store key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl RateLimitSection {
    /// Returns the window as a [`Duration`].
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: default_requests_per_window(),
            window_ms: default_window_ms(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_requests_per_window() -> u64 {
    10
}

fn default_window_ms() -> u64 {
    1000
}

fn default_key_prefix() -> String {
    "rate_limit:".to_string()
}

/// A pipeline stage, as named in configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Panic isolation.
    Recover,
    /// Security header policy.
    SecurityHeaders,
    /// Trace id and client identity propagation.
    Trace,
    /// Request logging.
    Logger,
    /// Request metrics.
    Metrics,
    /// Per-client rate limiting.
    RateLimit,
}

impl StageKind {
    /// Every stage, in the default order.
    pub const DEFAULT_ORDER: [Self; 6] = [
        Self::SecurityHeaders,
        Self::Trace,
        Self::Recover,
        Self::Logger,
        Self::Metrics,
        Self::RateLimit,
    ];

    /// Returns the configuration name of the stage.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Recover => "recover",
            Self::SecurityHeaders => "security_headers",
            Self::Trace => "trace",
            Self::Logger => "logger",
            Self::Metrics => "metrics",
            Self::RateLimit => "rate_limit",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::DEFAULT_ORDER
            .into_iter()
            .find(|stage| stage.name() == s.trim())
            .ok_or_else(|| format!("unknown stage: {s}"))
    }
}

/// Pipeline section: which stages run, outermost first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PipelineSection {
    /// Ordered stage list.
    #[serde(default = "default_stages")]
    pub stages: Vec<StageKind>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            stages: default_stages(),
        }
    }
}

fn default_stages() -> Vec<StageKind> {
    StageKind::DEFAULT_ORDER.to_vec()
}

/// Counter store section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// `redis://` URL of the shared store. Absent means the in-process
    /// memory store.
    #[serde(default)]
    pub url: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines.
    #[default]
    Json,
    /// Human-readable.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Enable log output.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level or filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Enable the Prometheus exporter.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scrape endpoint address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

/// Telemetry section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsSection,
}

fn default_true() -> bool {
    true
}
