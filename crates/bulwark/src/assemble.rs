//! Pipeline assembly from configuration.

use bulwark_config::{BulwarkConfig, RateLimitSection, StageKind};
use bulwark_middleware::stages::{
    LoggerMiddleware, MetricsMiddleware, RateLimitConfig, RateLimitMiddleware, RecoverMiddleware,
    SecurityHeadersMiddleware, TraceMiddleware,
};
use bulwark_middleware::{BoxedMiddleware, CounterStore, Handler, Pipeline};
use std::sync::Arc;

/// Converts the configuration section into limiter settings.
#[must_use]
pub fn rate_limit_config(section: &RateLimitSection) -> RateLimitConfig {
    RateLimitConfig {
        enabled: section.enabled,
        requests_per_window: section.requests_per_window,
        window: section.window(),
        key_prefix: section.key_prefix.clone(),
    }
}

/// Creates the middleware for one configured stage.
#[must_use]
pub fn stage_for(
    kind: StageKind,
    config: &BulwarkConfig,
    store: &Arc<dyn CounterStore>,
) -> BoxedMiddleware {
    match kind {
        StageKind::Recover => Arc::new(RecoverMiddleware::new()),
        StageKind::SecurityHeaders => Arc::new(SecurityHeadersMiddleware::new()),
        StageKind::Trace => Arc::new(TraceMiddleware::new()),
        StageKind::Logger => Arc::new(LoggerMiddleware::new(config.service.name.clone())),
        StageKind::Metrics => Arc::new(MetricsMiddleware::new()),
        StageKind::RateLimit => Arc::new(RateLimitMiddleware::new(
            rate_limit_config(&config.rate_limit),
            Arc::clone(store),
        )),
    }
}

/// Builds the pipeline named by `config.pipeline.stages`, in that order,
/// around `handler`.
///
/// `store` backs the rate limit stage and is otherwise unused.
pub fn pipeline_from_config<H: Handler>(
    config: &BulwarkConfig,
    store: Arc<dyn CounterStore>,
    handler: H,
) -> Pipeline {
    let builder = config
        .pipeline
        .stages
        .iter()
        .fold(Pipeline::builder(), |builder, &kind| {
            builder.boxed_stage(stage_for(kind, config, &store))
        });

    tracing::debug!(stages = ?config.pipeline.stages, "pipeline assembled");
    builder.build(handler)
}
