//! Request logging middleware.
//!
//! Emits two structured events per request:
//!
//! | Message | When | Fields |
//! |---------|------|--------|
//! | `init` | on entry | `trace_id`, `service`, `client`, `method`, `path` |
//! | `done` | after every inner stage has returned | the above plus `status`, `size` |
//!
//! The inner chain runs inside a `request` span carrying the entry fields,
//! so anything the handler logs is correlated with the request.
//!
//! Trace id and client come from the [`RequestContext`] when the trace stage
//! ran further out; otherwise they are read from the request directly.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::sink::{ResponseCapture, ResponseSink};
use crate::stages::trace;
use crate::types::Request;
use tracing::Instrument;

/// Middleware that logs the start and completion of each request.
#[derive(Debug, Clone)]
pub struct LoggerMiddleware {
    /// Service name attached to every event.
    service_name: String,
}

impl LoggerMiddleware {
    /// Creates a logger for `service_name`.
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Returns the service name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Default for LoggerMiddleware {
    fn default() -> Self {
        Self::new("unknown")
    }
}

impl Middleware for LoggerMiddleware {
    fn name(&self) -> &'static str {
        "logger"
    }

    fn process<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        sink: &'a mut dyn ResponseSink,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let trace_id = ctx.trace_id().map_or_else(
                || trace::inbound_trace_id(&request).unwrap_or_default(),
                str::to_string,
            );
            let client = ctx
                .client_identity()
                .map_or_else(|| trace::client_identity(&request), str::to_string);
            let method = request.method().to_string();
            let path = request.uri().path().to_string();
            let service = self.service_name.as_str();

            tracing::info!(
                trace_id = %trace_id,
                service = %service,
                client = %client,
                method = %method,
                path = %path,
                "init"
            );

            let span = tracing::info_span!(
                "request",
                trace_id = %trace_id,
                service = %service,
                client = %client,
                method = %method,
                path = %path,
            );

            let mut capture = ResponseCapture::new(sink);
            next.run(ctx, request, &mut capture).instrument(span).await;
            let state = capture.state();

            tracing::info!(
                trace_id = %trace_id,
                service = %service,
                client = %client,
                method = %method,
                path = %path,
                status = state.status.as_u16(),
                size = state.bytes_written,
                "done"
            );
        })
    }
}
