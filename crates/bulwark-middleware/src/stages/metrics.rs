//! Request metrics middleware.
//!
//! Measures wall-clock time around the inner chain and, once it returns,
//! reports one [`RequestSample`] to a [`RequestRecorder`]. The default
//! [`PrometheusRecorder`] feeds:
//!
//! - `http_request_duration_seconds{path, method}`
//! - `http_requests_total{path, method, status}`
//!
//! Status is read from this stage's own [`ResponseCapture`] after the inner
//! chain has finished, so it reflects the final status.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::sink::{ResponseCapture, ResponseSink};
use crate::types::Request;
use http::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One completed request, as seen by the metrics stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestSample<'a> {
    /// Request path.
    pub path: &'a str,
    /// Request method.
    pub method: &'a str,
    /// Final status.
    pub status: StatusCode,
    /// Time spent in the inner chain.
    pub duration: Duration,
}

/// Destination for request measurements.
pub trait RequestRecorder: Send + Sync + 'static {
    /// Records one completed request.
    fn record(&self, sample: &RequestSample<'_>);
}

/// Records into the process-wide `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusRecorder;

impl RequestRecorder for PrometheusRecorder {
    fn record(&self, sample: &RequestSample<'_>) {
        bulwark_telemetry::metrics::record_request(
            sample.path,
            sample.method,
            sample.status.as_u16(),
            sample.duration,
        );
    }
}

/// Middleware that records request duration and count.
#[derive(Clone)]
pub struct MetricsMiddleware {
    recorder: Arc<dyn RequestRecorder>,
}

impl MetricsMiddleware {
    /// Creates the middleware with the [`PrometheusRecorder`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_recorder(PrometheusRecorder)
    }

    /// Creates the middleware with a custom recorder.
    #[must_use]
    pub fn with_recorder<R: RequestRecorder>(recorder: R) -> Self {
        Self {
            recorder: Arc::new(recorder),
        }
    }
}

impl Default for MetricsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricsMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsMiddleware").finish_non_exhaustive()
    }
}

impl Middleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn process<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        sink: &'a mut dyn ResponseSink,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let start = Instant::now();
            let method = request.method().to_string();
            let path = request.uri().path().to_string();

            let mut capture = ResponseCapture::new(sink);
            next.run(ctx, request, &mut capture).await;

            self.recorder.record(&RequestSample {
                path: &path,
                method: &method,
                status: capture.status(),
                duration: start.elapsed(),
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::handler_fn;
    use crate::sink::BufferedResponse;
    use bytes::Bytes;
    use http_body_util::Full;
    use std::sync::Mutex;

    #[derive(Default, Clone)]
    struct Collecting {
        samples: Arc<Mutex<Vec<(String, String, u16, Duration)>>>,
    }

    impl RequestRecorder for Collecting {
        fn record(&self, sample: &RequestSample<'_>) {
            self.samples.lock().unwrap().push((
                sample.path.to_string(),
                sample.method.to_string(),
                sample.status.as_u16(),
                sample.duration,
            ));
        }
    }

    fn post(path: &str) -> Request {
        http::Request::builder()
            .method("POST")
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_final_status_and_duration() {
        let recorder = Collecting::default();
        let middleware = MetricsMiddleware::with_recorder(recorder.clone());
        let handler = handler_fn(|_ctx, _req, sink| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                sink.write_status(StatusCode::ACCEPTED);
            })
        });
        let mut sink = BufferedResponse::new();

        middleware
            .process(
                RequestContext::new(),
                post("/jobs?id=1"),
                &mut sink,
                Next::handler(&handler),
            )
            .await;

        let samples = recorder.samples.lock().unwrap();
        assert_eq!(samples.len(), 1);
        let (path, method, status, duration) = &samples[0];
        assert_eq!(path, "/jobs");
        assert_eq!(method, "POST");
        assert_eq!(*status, 202);
        assert!(*duration >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_default_status_is_ok() {
        let recorder = Collecting::default();
        let middleware = MetricsMiddleware::with_recorder(recorder.clone());
        let handler = handler_fn(|_ctx, _req, sink| {
            Box::pin(async move {
                sink.write_all(b"implicit").unwrap();
            })
        });
        let mut sink = BufferedResponse::new();

        middleware
            .process(RequestContext::new(), post("/"), &mut sink, Next::handler(&handler))
            .await;

        assert_eq!(recorder.samples.lock().unwrap()[0].2, 200);
    }

    #[tokio::test]
    async fn test_prometheus_recorder_without_exporter() {
        let middleware = MetricsMiddleware::new();
        let handler = handler_fn(|_ctx, _req, _sink| Box::pin(async {}));
        let mut sink = BufferedResponse::new();

        middleware
            .process(RequestContext::new(), post("/"), &mut sink, Next::handler(&handler))
            .await;

        assert_eq!(middleware.name(), "metrics");
    }
}
