//! Panic isolation middleware.
//!
//! Contains a panic raised anywhere further in (inner stages or the
//! handler) to the request that caused it. The worker thread keeps
//! serving other requests.
//!
//! On a contained panic the stage emits one ERROR event, message `panic`,
//! with fields:
//!
//! - `recover` - the panic payload, when it is a string
//! - `file`, `line` - where the panic was raised
//! - `stacktrace` - a backtrace captured at the panic site
//! - `trace_id` - from the context, or the inbound header
//!
//! If nothing had been written to the response yet, the stage writes
//! `500 Internal Server Error`; otherwise the partial response stands.
//!
//! Place this stage outermost or right after the trace stage so that other
//! stages' own panics are contained too.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::sink::{ResponseCapture, ResponseSink};
use crate::stages::trace;
use crate::types::Request;
use futures_util::future::{self, FutureExt};
use http::StatusCode;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

/// Where and how a panic was raised, recorded by the panic hook.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PanicReport {
    file: String,
    line: u32,
    stacktrace: String,
}

impl PanicReport {
    fn unknown() -> Self {
        Self {
            file: "unknown".to_string(),
            line: 0,
            stacktrace: String::new(),
        }
    }
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicReport>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Chains a hook in front of the current one that records the panic site
/// for the panicking thread. The previous hook still runs.
fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let report = PanicReport {
                file: info
                    .location()
                    .map_or_else(|| "unknown".to_string(), |l| l.file().to_string()),
                line: info.location().map_or(0, |l| l.line()),
                stacktrace: Backtrace::force_capture().to_string(),
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(report));
            previous(info);
        }));
    });
}

fn take_panic_report() -> Option<PanicReport> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}

/// Drops whatever report a previous panic on this thread left behind.
fn clear_panic_report() {
    LAST_PANIC.with(|slot| slot.borrow_mut().take());
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Middleware that contains panics raised further in.
#[derive(Debug, Clone, Copy)]
pub struct RecoverMiddleware;

impl RecoverMiddleware {
    /// Creates the middleware and installs the panic hook it relies on.
    #[must_use]
    pub fn new() -> Self {
        install_panic_hook();
        Self
    }
}

impl Default for RecoverMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for RecoverMiddleware {
    fn name(&self) -> &'static str {
        "recover"
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

            let mut capture = ResponseCapture::new(sink);
            // A payload re-raised with `resume_unwind` skips the hook, so the
            // slot is cleared before every poll and never reports a stale site.
            let mut inner = Box::pin(next.run(ctx, request, &mut capture));
            let guarded = future::poll_fn(move |cx| {
                clear_panic_report();
                inner.as_mut().poll(cx)
            });
            let outcome = AssertUnwindSafe(guarded).catch_unwind().await;

            let Err(payload) = outcome else {
                return;
            };

            let report = take_panic_report().unwrap_or_else(PanicReport::unknown);
            tracing::error!(
                recover = %payload_message(payload.as_ref()),
                file = %report.file,
                line = report.line,
                stacktrace = %report.stacktrace,
                trace_id = %trace_id,
                "panic"
            );
            bulwark_telemetry::metrics::record_panic_recovered();

            if !capture.state().wrote_anything() {
                capture.write_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        })
    }
}
