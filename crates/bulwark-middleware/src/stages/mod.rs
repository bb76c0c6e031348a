//! Middleware stages.
//!
//! | Stage | Name | Purpose |
//! |-------|------|---------|
//! | [`SecurityHeadersMiddleware`] | `security_headers` | Fixed hardening headers |
//! | [`TraceMiddleware`] | `trace` | Trace id and client identity into the context |
//! | [`RecoverMiddleware`] | `recover` | Contain panics from inner stages and the handler |
//! | [`LoggerMiddleware`] | `logger` | `init` / `done` events |
//! | [`MetricsMiddleware`] | `metrics` | Request duration and count |
//! | [`RateLimitMiddleware`] | `rate_limit` | Per-client quota over a shared counter store |
//!
//! Stages are independent: each reads what it needs from the
//! [`RequestContext`](crate::RequestContext) or the request and decorates the
//! sink on its own. Order is chosen by whoever builds the pipeline; the
//! table above is the recommended order.

pub mod logger;
pub mod metrics;
pub mod rate_limit;
pub mod recover;
pub mod security_headers;
pub mod trace;

pub use logger::LoggerMiddleware;
pub use metrics::{MetricsMiddleware, PrometheusRecorder, RequestRecorder, RequestSample};
pub use rate_limit::{Admission, RateLimitBuilder, RateLimitConfig, RateLimitMiddleware};
pub use recover::RecoverMiddleware;
pub use security_headers::SecurityHeadersMiddleware;
pub use trace::TraceMiddleware;
