//! # Bulwark Middleware
//!
//! Composable request-processing chain for network services.
//!
//! A [`Pipeline`] wraps an application [`Handler`] in an ordered list of
//! [`Middleware`] stages. Stages write into a [`ResponseSink`], share derived
//! values through an immutable [`RequestContext`], and may short-circuit by
//! writing a response without delegating.
//!
//! ```text
//! Request → SecurityHeaders → Trace → Recover → Logger → Metrics → RateLimit → Handler
//!                                                                                 ↓
//!    done ← SecurityHeaders ← Trace ← Recover ← Logger ← Metrics ← RateLimit ←────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`middleware`] | `Middleware`, `Handler`, `Next`, `handler_fn` |
//! | [`pipeline`] | `Pipeline`, `PipelineBuilder` |
//! | [`context`] | `RequestContext`, `ContextKey` |
//! | [`sink`] | `ResponseSink`, `BufferedResponse`, `ResponseCapture` |
//! | [`stages`] | The six built-in stages |
//! | [`store`] | `CounterStore` and its implementations |
//!
//! ## Example
//!
//! ```ignore
//! use bulwark_middleware::stages::*;
//! use bulwark_middleware::store::MemoryCounterStore;
//! use bulwark_middleware::{handler_fn, Pipeline};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryCounterStore::new());
//! let pipeline = Pipeline::builder()
//!     .stage(SecurityHeadersMiddleware::new())
//!     .stage(TraceMiddleware::new())
//!     .stage(RecoverMiddleware::new())
//!     .stage(LoggerMiddleware::new("orders"))
//!     .stage(MetricsMiddleware::new())
//!     .stage(RateLimitMiddleware::builder(store).limit(10).build())
//!     .build(handler_fn(|_ctx, _req, sink| Box::pin(async move {
//!         let _ = sink.write_all(b"hello");
//!     })));
//! ```

#![doc(html_root_url = "https://docs.rs/bulwark-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod middleware;
pub mod pipeline;
pub mod sink;
pub mod stages;
pub mod store;
pub mod types;

// Re-export main types at crate root
pub use context::{ContextKey, RequestContext};
pub use middleware::{handler_fn, BoxFuture, Handler, HandlerFn, Middleware, Next};
pub use pipeline::{BoxedMiddleware, Pipeline, PipelineBuilder};
pub use sink::{BufferedResponse, CaptureState, ResponseCapture, ResponseSink};
pub use store::{CounterStore, MemoryCounterStore, StoreError, StoreResult};
pub use types::{PeerAddr, Request, Response};
