//! Security header middleware.
//!
//! Sets a fixed hardening policy on every response before delegating:
//!
//! | Header | Value |
//! |--------|-------|
//! | `X-Frame-Options` | `DENY` |
//! | `X-Content-Type-Options` | `nosniff` |
//! | `X-XSS-Protection` | `1; mode=block` |
//! | `Content-Security-Policy` | same-origin scripts, styles (inline allowed), images (`data:` allowed) |
//! | `Referrer-Policy` | `same-origin` |
//!
//! Headers only take effect if they are set before the first status or body
//! write, so this stage belongs near the front of the chain.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::sink::ResponseSink;
use crate::types::Request;
use http::header::{
    CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
    X_XSS_PROTECTION,
};
use http::{HeaderName, HeaderValue};

/// Content security policy applied to every response.
pub const CONTENT_SECURITY_POLICY_VALUE: &str =
    "default-src 'self'; img-src 'self' data:; style-src 'self' 'unsafe-inline'; script-src 'self'";

fn policy() -> [(HeaderName, HeaderValue); 5] {
    [
        (X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
        (X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")),
        (
            CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY_VALUE),
        ),
        (REFERRER_POLICY, HeaderValue::from_static("same-origin")),
    ]
}

/// Middleware that sets the security header policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityHeadersMiddleware;

impl SecurityHeadersMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for SecurityHeadersMiddleware {
    fn name(&self) -> &'static str {
        "security_headers"
    }

    fn process<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        sink: &'a mut dyn ResponseSink,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let headers = sink.headers_mut();
            for (name, value) in policy() {
                headers.insert(name, value);
            }

            next.run(ctx, request, sink).await;
        })
    }
}
