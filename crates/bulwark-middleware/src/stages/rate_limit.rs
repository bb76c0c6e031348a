//! Distributed rate limiting middleware.
//!
//! Enforces a fixed-window quota per client identity. The count lives in an
//! external [`CounterStore`] shared by every instance of the service, so the
//! store's atomic increment is the only coordination between concurrent
//! requests.
//!
//! ## Per-client window
//!
//! ```text
//! no counter ──increment (count = 1, expiry = window)──▶ active
//!     ▲                                                   │
//!     └────────────── expiry elapses ◀────────────────────┘
//! ```
//!
//! While active, each request increments the counter. A request whose
//! post-increment count exceeds `requests_per_window` gets `429 Too Many
//! Requests` with no body and never reaches inner stages.
//!
//! ## Failure policy
//!
//! If the store cannot be reached, the request is **admitted** (fail-open).
//! The failure is logged and counted in
//! `rate_limit_store_failures_total{operation="increment"}`.
//!
//! ## Example
//!
//! ```ignore
//! use bulwark_middleware::stages::RateLimitMiddleware;
//! use bulwark_middleware::store::MemoryCounterStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let rate_limit = RateLimitMiddleware::builder(Arc::new(MemoryCounterStore::new()))
//!     .limit(100)
//!     .window(Duration::from_secs(1))
//!     .build();
//! ```

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::sink::ResponseSink;
use crate::stages::trace;
use crate::store::CounterStore;
use crate::types::Request;
use bulwark_telemetry::metrics as telemetry;
use http::StatusCode;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for rate limiting middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Whether the limiter consults the store at all.
    pub enabled: bool,
    /// Maximum admitted requests per client per window.
    pub requests_per_window: u64,
    /// Window length.
    pub window: Duration,
    /// Prefix prepended to the client identity to form the store key.
    pub key_prefix: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: 10,
            window: Duration::from_secs(1),
            key_prefix: "rate_limit:".to_string(),
        }
    }
}

/// Outcome of consulting the store for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Within quota.
    Admitted {
        /// Post-increment count.
        count: i64,
    },
    /// Over quota.
    Rejected {
        /// Post-increment count.
        count: i64,
    },
    /// Store failed; admitted anyway.
    FailedOpen,
    /// Limiter disabled; store not consulted.
    Bypassed,
}

impl Admission {
    /// Returns `true` if the request may proceed.
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Middleware that enforces a per-client request quota.
#[derive(Clone)]
pub struct RateLimitMiddleware {
    config: RateLimitConfig,
    store: Arc<dyn CounterStore>,
}

impl RateLimitMiddleware {
    /// Creates a limiter from a configuration and a store.
    #[must_use]
    pub fn new(config: RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        Self { config, store }
    }

    /// Creates a new rate limit builder.
    #[must_use]
    pub fn builder(store: Arc<dyn CounterStore>) -> RateLimitBuilder {
        RateLimitBuilder {
            config: RateLimitConfig::default(),
            store,
        }
    }

    /// Returns the rate limit configuration.
    #[must_use]
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Returns the store key for a client identity.
    ///
    /// An empty identity maps to the bare prefix, one bucket shared by every
    /// request whose client could not be determined.
    #[must_use]
    pub fn key_for(&self, client: &str) -> String {
        format!("{}{client}", self.config.key_prefix)
    }

    /// Counts one request for `client` and decides whether it may proceed.
    pub async fn check(&self, client: &str) -> Admission {
        if !self.config.enabled {
            return Admission::Bypassed;
        }

        let key = self.key_for(client);
        match self.store.increment_window(&key, self.config.window).await {
            Ok(count) if exceeds(count, self.config.requests_per_window) => {
                Admission::Rejected { count }
            }
            Ok(count) => Admission::Admitted { count },
            Err(error) => {
                tracing::warn!(
                    client,
                    error = %error,
                    "counter store unavailable, admitting request"
                );
                telemetry::record_store_failure("increment");
                Admission::FailedOpen
            }
        }
    }
}

fn exceeds(count: i64, limit: u64) -> bool {
    u64::try_from(count).is_ok_and(|count| count > limit)
}

impl std::fmt::Debug for RateLimitMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitMiddleware")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn process<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        sink: &'a mut dyn ResponseSink,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if !self.config.enabled {
                next.run(ctx, request, sink).await;
                return;
            }

            let client = ctx
                .client_identity()
                .map_or_else(|| trace::client_identity(&request), str::to_string);

            match self.check(&client).await {
                Admission::Rejected { count } => {
                    tracing::debug!(
                        client = %client,
                        count,
                        limit = self.config.requests_per_window,
                        "rate limit exceeded"
                    );
                    telemetry::record_rate_limited();
                    sink.write_status(StatusCode::TOO_MANY_REQUESTS);
                }
                _ => next.run(ctx, request, sink).await,
            }
        })
    }
}

/// Builder for [`RateLimitMiddleware`].
pub struct RateLimitBuilder {
    config: RateLimitConfig,
    store: Arc<dyn CounterStore>,
}

impl RateLimitBuilder {
    /// Enables or disables the limiter.
    ///
    /// Default: enabled.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Sets the maximum number of requests allowed per window.
    ///
    /// Default: 10 requests.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.config.requests_per_window = limit;
        self
    }

    /// Sets the window length.
    ///
    /// Default: 1 second.
    #[must_use]
    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    /// Sets the store key prefix.
    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    /// Builds the rate limit middleware.
    #[must_use]
    pub fn build(self) -> RateLimitMiddleware {
        RateLimitMiddleware::new(self.config, self.store)
    }
}

impl std::fmt::Debug for RateLimitBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextKey;
    use crate::middleware::handler_fn;
    use crate::sink::BufferedResponse;
    use crate::store::{MemoryCounterStore, StoreError, StoreResult};
    use bytes::Bytes;
    use http_body_util::Full;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store whose every call fails and is counted.
    #[derive(Default)]
    struct DownStore {
        calls: AtomicUsize,
    }

    impl CounterStore for DownStore {
        fn increment<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, StoreResult<i64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(StoreError::Unavailable("connection refused".into())) })
        }

        fn expire<'a>(&'a self, _key: &'a str, _ttl: Duration) -> BoxFuture<'a, StoreResult<()>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(StoreError::Timeout) })
        }
    }

    fn create_test_request() -> Request {
        http::Request::builder()
            .uri("/test")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    async fn send(middleware: &RateLimitMiddleware, client: &str) -> StatusCode {
        let handler = handler_fn(|_ctx, _req, sink| {
            Box::pin(async move {
                sink.write_status(StatusCode::OK);
                sink.write_all(b"ok").unwrap();
            })
        });
        let ctx = RequestContext::new().with_value(ContextKey::ClientIdentity, client);
        let mut sink = BufferedResponse::new();

        middleware
            .process(ctx, create_test_request(), &mut sink, Next::handler(&handler))
            .await;

        if sink.status() == StatusCode::TOO_MANY_REQUESTS {
            assert!(sink.body().is_empty());
        }
        sink.status()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fourth_request_in_window_is_rejected() {
        let middleware = RateLimitMiddleware::builder(Arc::new(MemoryCounterStore::new()))
            .limit(3)
            .window(Duration::from_secs(1))
            .build();

        for _ in 0..3 {
            assert_eq!(send(&middleware, "203.0.113.5").await, StatusCode::OK);
        }
        assert_eq!(
            send(&middleware, "203.0.113.5").await,
            StatusCode::TOO_MANY_REQUESTS
        );

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(send(&middleware, "203.0.113.5").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_clients_have_separate_buckets() {
        let middleware = RateLimitMiddleware::builder(Arc::new(MemoryCounterStore::new()))
            .limit(1)
            .build();

        assert_eq!(send(&middleware, "a").await, StatusCode::OK);
        assert_eq!(send(&middleware, "b").await, StatusCode::OK);
        assert_eq!(send(&middleware, "a").await, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_empty_identity_shares_one_bucket() {
        let store = Arc::new(MemoryCounterStore::new());
        let middleware = RateLimitMiddleware::builder(store.clone()).limit(2).build();

        assert_eq!(send(&middleware, "").await, StatusCode::OK);
        assert_eq!(send(&middleware, "").await, StatusCode::OK);
        assert_eq!(send(&middleware, "").await, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(store.count("rate_limit:"), Some(3));
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        let store = Arc::new(DownStore::default());
        let middleware = RateLimitMiddleware::builder(store.clone()).limit(0).build();

        for _ in 0..5 {
            assert_eq!(send(&middleware, "10.0.0.1").await, StatusCode::OK);
        }
        assert_eq!(middleware.check("10.0.0.1").await, Admission::FailedOpen);
    }

    #[tokio::test]
    async fn test_disabled_never_touches_store() {
        let store = Arc::new(DownStore::default());
        let middleware = RateLimitMiddleware::builder(store.clone())
            .enabled(false)
            .limit(0)
            .build();

        assert_eq!(send(&middleware, "10.0.0.1").await, StatusCode::OK);
        assert_eq!(middleware.check("10.0.0.1").await, Admission::Bypassed);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_identity_falls_back_to_request_headers() {
        let store = Arc::new(MemoryCounterStore::new());
        let middleware = RateLimitMiddleware::builder(store.clone()).build();
        let handler = handler_fn(|_ctx, _req, _sink| Box::pin(async {}));
        let request = http::Request::builder()
            .uri("/test")
            .header(trace::headers::REAL_IP, "192.0.2.9:1234")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let mut sink = BufferedResponse::new();

        middleware
            .process(RequestContext::new(), request, &mut sink, Next::handler(&handler))
            .await;

        assert_eq!(store.count("rate_limit:192.0.2.9"), Some(1));
    }

    #[test]
    fn test_exceeds() {
        assert!(!exceeds(3, 3));
        assert!(exceeds(4, 3));
        assert!(!exceeds(-1, 0));
    }

    #[test]
    fn test_key_for() {
        let middleware = RateLimitMiddleware::builder(Arc::new(MemoryCounterStore::new()))
            .key_prefix("rl:")
            .build();
        assert_eq!(middleware.key_for("10.0.0.1"), "rl:10.0.0.1");
        assert_eq!(middleware.name(), "rate_limit");
        assert!(Admission::FailedOpen.is_admitted());
        assert!(!Admission::Rejected { count: 4 }.is_admitted());
    }
}
