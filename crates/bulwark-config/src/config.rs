//! Main configuration types.
//!
//! This module provides the top-level [`BulwarkConfig`] struct and its builder.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{
    ConfigError, LogFormat, PipelineSection, RateLimitSection, ServiceConfig, StageKind,
    StoreSection, TelemetrySection,
};

/// Complete bulwark configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use bulwark_config::BulwarkConfig;
///
/// let config = BulwarkConfig::default();
/// assert_eq!(config.service.name, "bulwark-service");
/// assert_eq!(config.rate_limit.requests_per_window, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct BulwarkConfig {
    /// Service identity.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Rate limiter settings.
    #[serde(default)]
    pub rate_limit: RateLimitSection,

    /// Stage selection and order.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Counter store backend.
    #[serde(default)]
    pub store: StoreSection,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl BulwarkConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> BulwarkConfigBuilder {
        BulwarkConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if:
    /// - The service name is empty
    /// - The rate limit window or quota is zero while the limiter is enabled
    /// - A stage appears twice in the pipeline
    /// - The store URL is not a `redis://` or `rediss://` URL
    /// - The metrics address is not a socket address while metrics are enabled
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.name.trim().is_empty() {
            return Err(ConfigError::invalid_value("service.name", "must not be empty"));
        }

        if self.rate_limit.enabled {
            if self.rate_limit.window_ms == 0 {
                return Err(ConfigError::invalid_value(
                    "rate_limit.window_ms",
                    "must be greater than zero",
                ));
            }
            if self.rate_limit.requests_per_window == 0 {
                return Err(ConfigError::invalid_value(
                    "rate_limit.requests_per_window",
                    "must be greater than zero",
                ));
            }
        }

        let mut seen = HashSet::new();
        for stage in &self.pipeline.stages {
            if !seen.insert(*stage) {
                return Err(ConfigError::validation_error(format!(
                    "duplicate stage in pipeline.stages: {stage}"
                )));
            }
        }

        if let Some(url) = &self.store.url {
            if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
                return Err(ConfigError::invalid_value(
                    "store.url",
                    format!("expected a redis:// URL, got {url}"),
                ));
            }
        }

        if self.telemetry.metrics.enabled
            && self
                .telemetry
                .metrics
                .addr
                .parse::<std::net::SocketAddr>()
                .is_err()
        {
            return Err(ConfigError::invalid_value(
                "telemetry.metrics.addr",
                format!("invalid socket address: {}", self.telemetry.metrics.addr),
            ));
        }

        Ok(())
    }

    /// Returns whether `stage` is part of the pipeline.
    #[must_use]
    pub fn has_stage(&self, stage: StageKind) -> bool {
        self.pipeline.stages.contains(&stage)
    }

    /// Create a development configuration preset.
    ///
    /// Pretty debug logs, no metrics exporter.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.metrics.enabled = false;
        config
    }

    /// Create a production configuration preset.
    ///
    /// JSON logs at `info`, metrics exporter on.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config.telemetry.metrics.enabled = true;
        config
    }
}

/// Builder for [`BulwarkConfig`].
#[derive(Debug, Default)]
#[must_use]
pub struct BulwarkConfigBuilder {
    config: BulwarkConfig,
}

impl BulwarkConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service name.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config.service.name = name.into();
        self
    }

    /// Set the rate limiter section.
    pub fn rate_limit(mut self, rate_limit: RateLimitSection) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    /// Set the pipeline stages, outermost first.
    pub fn stages(mut self, stages: impl IntoIterator<Item = StageKind>) -> Self {
        self.config.pipeline.stages = stages.into_iter().collect();
        self
    }

    /// Set the counter store URL.
    pub fn store_url(mut self, url: impl Into<String>) -> Self {
        self.config.store.url = Some(url.into());
        self
    }

    /// Set the telemetry section.
    pub fn telemetry(mut self, telemetry: TelemetrySection) -> Self {
        self.config.telemetry = telemetry;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> BulwarkConfig {
        self.config
    }
}
