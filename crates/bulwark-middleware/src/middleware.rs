//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that all stages implement,
//! the terminal [`Handler`] trait, and [`Next`], the continuation a stage
//! calls to delegate inward.
//!
//! # Example
//!
//! ```ignore
//! use bulwark_middleware::{BoxFuture, Middleware, Next, Request, RequestContext, ResponseSink};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: RequestContext,
//!         request: Request,
//!         sink: &'a mut dyn ResponseSink,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, ()> {
//!         Box::pin(async move {
//!             let start = std::time::Instant::now();
//!             next.run(ctx, request, sink).await;
//!             tracing::debug!(elapsed = ?start.elapsed(), "timing");
//!         })
//!     }
//! }
//! ```

use crate::context::RequestContext;
use crate::sink::ResponseSink;
use crate::types::Request;
use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A stage in the chain.
///
/// Stages hold only construction-time state (configuration, store handles)
/// and are shared by every concurrent request.
///
/// # Invariants
///
/// - A stage calls `next.run()` at most once; not calling it short-circuits
///   the chain, in which case the stage writes the response itself
/// - A stage augments the context it passes inward; it never replaces the
///   request or the sink it was given, though it may decorate the sink
pub trait Middleware: Send + Sync + 'static {
    /// Returns the unique name of this stage.
    ///
    /// This name is used for logging and for configuring stage order.
    fn name(&self) -> &'static str;

    /// Processes the request through this stage.
    fn process<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        sink: &'a mut dyn ResponseSink,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()>;
}

/// The application handler at the end of the chain.
///
/// Errors are reported through the sink's status; a panic is contained by
/// the recover stage if one is installed.
pub trait Handler: Send + Sync + 'static {
    /// Handles the request.
    fn call<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        sink: &'a mut dyn ResponseSink,
    ) -> BoxFuture<'a, ()>;
}

/// A handler created from a closure.
///
/// See [`handler_fn`].
pub struct HandlerFn<F> {
    func: F,
}

/// Creates a [`Handler`] from a closure returning a boxed future.
///
/// ```ignore
/// let handler = handler_fn(|_ctx, _request, sink| {
///     Box::pin(async move {
///         sink.write_status(StatusCode::OK);
///         let _ = sink.write_all(b"hello");
///     })
/// });
/// ```
pub const fn handler_fn<F>(func: F) -> HandlerFn<F>
where
    F: for<'a> Fn(RequestContext, Request, &'a mut dyn ResponseSink) -> BoxFuture<'a, ()>
        + Send
        + Sync
        + 'static,
{
    HandlerFn { func }
}

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(RequestContext, Request, &'a mut dyn ResponseSink) -> BoxFuture<'a, ()>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        sink: &'a mut dyn ResponseSink,
    ) -> BoxFuture<'a, ()> {
        (self.func)(ctx, request, sink)
    }
}

/// Continuation to invoke the rest of the chain.
///
/// Consumed by [`Next::run`], so it can be invoked at most once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    /// More stages to process
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    /// End of chain
    Handler(&'a dyn Handler),
}

impl<'a> Next<'a> {
    /// Creates a `Next` that will invoke `middleware`, then `next`.
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that invokes the handler.
    pub(crate) fn handler(handler: &'a dyn Handler) -> Self {
        Self {
            inner: NextInner::Handler(handler),
        }
    }

    /// Invokes the next stage or the handler.
    pub async fn run(self, ctx: RequestContext, request: Request, sink: &mut dyn ResponseSink) {
        match self.inner {
            NextInner::Chain { middleware, next } => {
                middleware.process(ctx, request, sink, *next).await;
            }
            NextInner::Handler(handler) => handler.call(ctx, request, sink).await,
        }
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            NextInner::Chain { middleware, .. } => {
                f.debug_tuple("Next").field(&middleware.name()).finish()
            }
            NextInner::Handler(_) => f.debug_tuple("Next").field(&"handler").finish(),
        }
    }
}
