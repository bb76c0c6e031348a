//! Trace and client identity propagation.
//!
//! Derives two values once per request and binds them into the
//! [`RequestContext`] for every stage further in:
//!
//! 1. **Trace id**: the `X-Trace-Id` header if present and non-empty,
//!    otherwise a fresh UUID v7, which is also written back onto the
//!    request's `X-Trace-Id` header so callees see the same id. An inbound
//!    header is never rewritten; bytes that are not valid UTF-8 appear in
//!    the context as U+FFFD.
//! 2. **Client identity**: the first entry of `X-Forwarded-For`, else
//!    `X-Real-IP`, else the transport [`PeerAddr`], else the empty string.
//!    A port is stripped, keeping the host.
//!
//! An empty identity is a valid outcome. The rate limiter counts all such
//! requests in one shared bucket.

use crate::context::{ContextKey, RequestContext};
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::sink::ResponseSink;
use crate::types::{PeerAddr, Request};
use http::HeaderValue;
use std::net::{IpAddr, SocketAddr};
use uuid::Uuid;

/// Header names consumed and produced by this stage.
pub mod headers {
    /// Trace id propagated between services.
    pub const TRACE_ID: &str = "x-trace-id";
    /// Proxy chain, client first.
    pub const FORWARDED_FOR: &str = "x-forwarded-for";
    /// Client address set by a single reverse proxy.
    pub const REAL_IP: &str = "x-real-ip";
}

/// Middleware that derives the trace id and client identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceMiddleware;

impl TraceMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for TraceMiddleware {
    fn name(&self) -> &'static str {
        "trace"
    }

    fn process<'a>(
        &'a self,
        ctx: RequestContext,
        mut request: Request,
        sink: &'a mut dyn ResponseSink,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let trace_id = ensure_trace_id(&mut request);
            let client = client_identity(&request);

            let ctx = ctx
                .with_value(ContextKey::TraceId, trace_id)
                .with_value(ContextKey::ClientIdentity, client);

            next.run(ctx, request, sink).await;
        })
    }
}

/// Returns the inbound trace id, generating and attaching one if missing.
pub fn ensure_trace_id(request: &mut Request) -> String {
    if let Some(existing) = inbound_trace_id(request) {
        return existing;
    }

    let trace_id = Uuid::now_v7().to_string();
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        request.headers_mut().insert(headers::TRACE_ID, value);
    }
    trace_id
}

/// Returns the inbound `X-Trace-Id`, if present and non-empty.
pub fn inbound_trace_id(request: &Request) -> Option<String> {
    header_text(request, headers::TRACE_ID)
}

/// Resolves the client identity of a request, port stripped.
pub fn client_identity(request: &Request) -> String {
    let forwarded = header_text(request, headers::FORWARDED_FOR)
        .and_then(|value| value.split(',').next().map(|first| first.trim().to_string()))
        .filter(|value| !value.is_empty());

    if let Some(client) = forwarded.or_else(|| header_text(request, headers::REAL_IP)) {
        return strip_port(&client);
    }

    request
        .extensions()
        .get::<PeerAddr>()
        .map(|peer| peer.addr().ip().to_string())
        .unwrap_or_default()
}

/// Removes a trailing `:port` from an address, keeping the host.
///
/// Bare IPv6 addresses are returned unchanged; bracketed ones lose their
/// brackets.
pub fn strip_port(value: &str) -> String {
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }
    if value.parse::<IpAddr>().is_ok() {
        return value.to_string();
    }
    if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        return inner.to_string();
    }
    match value.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => {
            host.to_string()
        }
        _ => value.to_string(),
    }
}

/// Header value as text, trimmed. Emptiness is judged on the raw bytes, so
/// a value with non-ASCII bytes is never treated as missing.
fn header_text(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::handler_fn;
    use crate::sink::BufferedResponse;
    use bytes::Bytes;
    use http_body_util::Full;

    fn request_with(headers: &[(&str, &str)], peer: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri("/test");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut request = builder.body(Full::new(Bytes::new())).unwrap();
        if let Some(peer) = peer {
            request
                .extensions_mut()
                .insert(PeerAddr(peer.parse().unwrap()));
        }
        request
    }

    /// Runs the stage and returns what the handler saw:
    /// (context trace id, context client, request trace header).
    async fn observe(request: Request) -> (String, String, String) {
        let handler = handler_fn(|ctx, request, sink| {
            Box::pin(async move {
                let header = request
                    .headers()
                    .get(headers::TRACE_ID)
                    .map(|v| v.to_str().unwrap().to_string())
                    .unwrap_or_default();
                let line = format!(
                    "{}|{}|{}",
                    ctx.trace_id().unwrap(),
                    ctx.client_identity().unwrap(),
                    header
                );
                sink.write_all(line.as_bytes()).unwrap();
            })
        });

        let mut sink = BufferedResponse::new();
        TraceMiddleware::new()
            .process(RequestContext::new(), request, &mut sink, Next::handler(&handler))
            .await;

        let body = String::from_utf8(sink.body().to_vec()).unwrap();
        let mut parts = body.split('|').map(String::from);
        (
            parts.next().unwrap(),
            parts.next().unwrap(),
            parts.next().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_inbound_trace_id_is_kept() {
        let request = request_with(&[(headers::TRACE_ID, "abc-123")], None);
        let (trace_id, _, header) = observe(request).await;
        assert_eq!(trace_id, "abc-123");
        assert_eq!(header, "abc-123");
    }

    #[tokio::test]
    async fn test_missing_trace_id_is_generated_and_attached() {
        let (trace_id, _, header) = observe(request_with(&[], None)).await;
        assert!(!trace_id.is_empty());
        assert!(Uuid::parse_str(&trace_id).is_ok());
        assert_eq!(header, trace_id);
    }

    #[tokio::test]
    async fn test_empty_trace_id_is_regenerated() {
        let request = request_with(&[(headers::TRACE_ID, "")], None);
        let (trace_id, _, header) = observe(request).await;
        assert!(!trace_id.is_empty());
        assert_eq!(header, trace_id);
    }

    #[test]
    fn test_non_ascii_trace_id_is_kept() {
        let mut request = request_with(&[], None);
        request.headers_mut().insert(
            headers::TRACE_ID,
            HeaderValue::from_bytes(b"trace-\xe9-1").unwrap(),
        );

        assert_eq!(ensure_trace_id(&mut request), "trace-\u{fffd}-1");
        assert_eq!(request.headers()[headers::TRACE_ID].as_bytes(), b"trace-\xe9-1");
        assert_eq!(request.headers().get_all(headers::TRACE_ID).iter().count(), 1);
    }

    #[tokio::test]
    async fn test_non_ascii_trace_id_reaches_handler() {
        let handler = handler_fn(|ctx, request, sink| {
            Box::pin(async move {
                sink.write_all(ctx.trace_id().unwrap().as_bytes()).unwrap();
                sink.write_all(b"|").unwrap();
                sink.write_all(request.headers()[headers::TRACE_ID].as_bytes()).unwrap();
            })
        });
        let mut request = request_with(&[], None);
        request.headers_mut().insert(
            headers::TRACE_ID,
            HeaderValue::from_bytes(b"trace-\xe9-1").unwrap(),
        );

        let mut sink = BufferedResponse::new();
        TraceMiddleware::new()
            .process(RequestContext::new(), request, &mut sink, Next::handler(&handler))
            .await;

        let mut expected = "trace-\u{fffd}-1|".as_bytes().to_vec();
        expected.extend_from_slice(b"trace-\xe9-1");
        assert_eq!(sink.body(), expected.as_slice());
    }

    #[tokio::test]
    async fn test_identity_precedence() {
        let all = request_with(
            &[
                (headers::FORWARDED_FOR, "198.51.100.7"),
                (headers::REAL_IP, "192.0.2.1"),
            ],
            Some("10.0.0.1:5000"),
        );
        assert_eq!(observe(all).await.1, "198.51.100.7");

        let real_ip = request_with(&[(headers::REAL_IP, "192.0.2.1")], Some("10.0.0.1:5000"));
        assert_eq!(observe(real_ip).await.1, "192.0.2.1");

        let peer_only = request_with(&[], Some("10.0.0.1:5000"));
        assert_eq!(observe(peer_only).await.1, "10.0.0.1");
    }

    #[tokio::test]
    async fn test_empty_forwarded_for_falls_through() {
        let request = request_with(
            &[(headers::FORWARDED_FOR, " "), (headers::REAL_IP, "192.0.2.1")],
            None,
        );
        assert_eq!(observe(request).await.1, "192.0.2.1");
    }

    #[tokio::test]
    async fn test_no_sources_yields_empty_identity() {
        assert_eq!(observe(request_with(&[], None)).await.1, "");
    }

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let request = request_with(
            &[(headers::FORWARDED_FOR, "203.0.113.5:54321, 10.0.0.2, 10.0.0.3")],
            None,
        );
        assert_eq!(client_identity(&request), "203.0.113.5");
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("203.0.113.5:54321"), "203.0.113.5");
        assert_eq!(strip_port("203.0.113.5"), "203.0.113.5");
        assert_eq!(strip_port("[2001:db8::1]:443"), "2001:db8::1");
        assert_eq!(strip_port("2001:db8::1"), "2001:db8::1");
        assert_eq!(strip_port("[2001:db8::1]"), "2001:db8::1");
        assert_eq!(strip_port("proxy.internal:8080"), "proxy.internal");
        assert_eq!(strip_port("proxy.internal"), "proxy.internal");
    }

    #[test]
    fn test_middleware_name() {
        assert_eq!(TraceMiddleware::new().name(), "trace");
    }
}
